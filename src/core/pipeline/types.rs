use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::config::ContentConfig;

/// Per-run lifecycle. Stages advance the state left to right; any
/// non-terminal state may drop to `RunFailed`, which ends the run but
/// never the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    IdeaGenerated,
    ScriptWritten,
    NarrationDone,
    MediaCollected,
    VideoComposed,
    Published,
    PublishFailed,
    RunFailed,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::IdeaGenerated => "idea_generated",
            RunState::ScriptWritten => "script_written",
            RunState::NarrationDone => "narration_done",
            RunState::MediaCollected => "media_collected",
            RunState::VideoComposed => "video_composed",
            RunState::Published => "published",
            RunState::PublishFailed => "publish_failed",
            RunState::RunFailed => "run_failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Published | RunState::PublishFailed | RunState::RunFailed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idea,
    Script,
    Narration,
    Media,
    Compose,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idea => "idea",
            Stage::Script => "script",
            Stage::Narration => "narration",
            Stage::Media => "media",
            Stage::Compose => "compose",
        }
    }
}

/// A stage returned empty/invalid output. Aborts the current run only;
/// the orchestrator logs it and moves to the next run.
#[derive(Debug)]
pub struct StageError {
    pub run_index: usize,
    pub stage: Stage,
    pub reason: String,
}

impl StageError {
    pub fn new(run_index: usize, stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            run_index,
            stage,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {} failed at {} stage: {}",
            self.run_index,
            self.stage.as_str(),
            self.reason
        )
    }
}

impl std::error::Error for StageError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishTarget {
    None,
    Mail,
    Tiktok,
}

impl PublishTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            PublishTarget::None => "none",
            PublishTarget::Mail => "mail",
            PublishTarget::Tiktok => "tiktok",
        }
    }

    pub fn from_flag(value: &str) -> Option<Self> {
        match value {
            "none" => Some(PublishTarget::None),
            "mail" | "email" => Some(PublishTarget::Mail),
            "tiktok" => Some(PublishTarget::Tiktok),
            _ => None,
        }
    }
}

/// One requested execution of the stage sequence. Immutable once built.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest {
    pub run_index: usize,
    pub target: PublishTarget,
}

#[derive(Debug, Clone)]
pub struct Idea {
    pub subject: String,
    pub concept: String,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub sentences: Vec<String>,
    pub raw: String,
}

#[derive(Debug, Clone)]
pub struct NarrationResult {
    /// Seconds per synthesized segment, in script order.
    pub durations: Vec<f64>,
    pub combined_path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct MediaSet {
    pub images: Vec<PathBuf>,
}

impl MediaSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn trim_to(&mut self, len: usize) {
        self.images.truncate(len);
    }
}

/// The durable output of a run. Never cleaned up by the pipeline.
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    pub path: PathBuf,
    pub duration_secs: f64,
}

#[derive(Debug, Clone)]
pub struct PublishMetadata {
    pub title: String,
    pub body: String,
    pub caption: String,
}

#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub success: bool,
    pub platform_id: Option<String>,
}

// ── Stage adapter contracts ──
//
// Each production implementation wraps a single external service call.
// The orchestrator only sees these traits, so tests swap in mocks.

#[async_trait]
pub trait IdeaGenerator: Send + Sync {
    async fn generate(&self, content: &ContentConfig) -> Result<Idea>;
}

#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn write(
        &self,
        concept: &str,
        duration_secs: u32,
        content: &ContentConfig,
    ) -> Result<Script>;
}

#[async_trait]
pub trait NarrationSynthesizer: Send + Sync {
    async fn synthesize(&self, script: &Script) -> Result<NarrationResult>;
}

#[async_trait]
pub trait MediaCollector: Send + Sync {
    async fn collect(
        &self,
        subject: &str,
        count: usize,
        content: &ContentConfig,
    ) -> Result<MediaSet>;
}

#[async_trait]
pub trait VideoComposer: Send + Sync {
    async fn compose(
        &self,
        media: &MediaSet,
        durations: &[f64],
        output_name: &str,
    ) -> Result<VideoArtifact>;
}
