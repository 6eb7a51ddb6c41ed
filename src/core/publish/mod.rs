pub mod mail;
pub mod platform;

use std::fmt;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tracing::info;

use crate::core::config::AppConfig;
use crate::core::pipeline::types::{PublishMetadata, PublishReceipt, PublishTarget, VideoArtifact};
use crate::core::vault::TokenStore;

/// Distribution failure after a video was produced. The orchestrator
/// logs these as warnings; the run still counts as having produced a
/// video.
#[derive(Debug)]
pub enum PublishError {
    /// Credential rejected after the one-shot refresh-and-retry.
    Auth(String),
    /// Status-poll budget exhausted without a terminal status.
    Timeout { attempts: u32 },
    /// The platform reported an explicit failure.
    Platform(String),
    /// Transport-level failure (network, SMTP, local IO).
    Transport(String),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Auth(msg) => write!(f, "authorization failed: {msg}"),
            PublishError::Timeout { attempts } => {
                write!(f, "processing status not terminal after {attempts} polls")
            }
            PublishError::Platform(reason) => write!(f, "platform rejected upload: {reason}"),
            PublishError::Transport(msg) => write!(f, "transport failure: {msg}"),
        }
    }
}

impl std::error::Error for PublishError {}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn target(&self) -> PublishTarget;

    async fn publish(
        &self,
        video: &VideoArtifact,
        meta: &PublishMetadata,
    ) -> Result<PublishReceipt, PublishError>;
}

/// Selected with `--no-publish` or target `none`: the video stays local.
pub struct NullPublisher;

#[async_trait]
impl Publisher for NullPublisher {
    fn target(&self) -> PublishTarget {
        PublishTarget::None
    }

    async fn publish(
        &self,
        video: &VideoArtifact,
        _meta: &PublishMetadata,
    ) -> Result<PublishReceipt, PublishError> {
        info!("Skipping distribution for {}", video.path.display());
        Ok(PublishReceipt {
            success: true,
            platform_id: None,
        })
    }
}

pub fn build_publisher(target: PublishTarget, config: &AppConfig) -> Result<Box<dyn Publisher>> {
    match target {
        PublishTarget::None => Ok(Box::new(NullPublisher)),
        PublishTarget::Mail => {
            let settings = config
                .mail
                .clone()
                .ok_or_else(|| anyhow!("[mail] section missing"))?;
            Ok(Box::new(mail::MailPublisher::new(settings)))
        }
        PublishTarget::Tiktok => {
            let settings = config
                .platform
                .clone()
                .ok_or_else(|| anyhow!("[platform] section missing"))?;
            let api = platform::TiktokApi::new(
                settings.client_key.clone(),
                settings.client_secret.clone(),
            );
            let store = TokenStore::new(settings.token_file.clone());
            Ok(Box::new(platform::PlatformPublisher::new(
                Box::new(api),
                store,
                settings.privacy_level,
            )))
        }
    }
}
