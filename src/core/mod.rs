pub mod config;
pub mod llm;
pub mod oauth;
pub mod pipeline;
pub mod publish;
pub mod stages;
pub mod terminal;
pub mod vault;
