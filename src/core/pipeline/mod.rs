pub mod types;

use std::path::PathBuf;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::core::config::ContentConfig;
use crate::core::publish::Publisher;
use types::{
    Idea, IdeaGenerator, MediaCollector, NarrationSynthesizer, PublishMetadata, RunRequest,
    RunState, Stage, StageError, ScriptWriter, VideoArtifact, VideoComposer,
};

/// Per-run state machine. Stages move strictly forward; any stage may
/// drop to `RunFailed`; after composition the only open question is
/// whether distribution worked.
pub fn can_transition(from: RunState, to: RunState) -> bool {
    if from == to {
        return true;
    }
    match from {
        RunState::Pending => matches!(to, RunState::IdeaGenerated | RunState::RunFailed),
        RunState::IdeaGenerated => matches!(to, RunState::ScriptWritten | RunState::RunFailed),
        RunState::ScriptWritten => matches!(to, RunState::NarrationDone | RunState::RunFailed),
        RunState::NarrationDone => matches!(to, RunState::MediaCollected | RunState::RunFailed),
        RunState::MediaCollected => matches!(to, RunState::VideoComposed | RunState::RunFailed),
        RunState::VideoComposed => matches!(to, RunState::Published | RunState::PublishFailed),
        RunState::Published | RunState::PublishFailed | RunState::RunFailed => false,
    }
}

fn advance(state: &mut RunState, to: RunState) {
    debug_assert!(
        can_transition(*state, to),
        "invalid transition {} -> {}",
        state.as_str(),
        to.as_str()
    );
    *state = to;
}

/// Keep alphanumerics, spaces, hyphens and underscores; everything else
/// becomes an underscore. Capped at 50 characters.
pub fn sanitize_subject(subject: &str) -> String {
    subject
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(50)
        .collect()
}

pub fn output_basename(run_index: usize, subject: &str) -> String {
    format!("{run_index:03}_{}", sanitize_subject(subject))
}

/// Per-run intermediates the orchestrator owns and sweeps after a
/// successful composition.
#[derive(Debug, Clone)]
pub struct TransientPaths {
    pub audio_dir: PathBuf,
    pub images_dir: PathBuf,
    pub combined_audio: PathBuf,
}

#[derive(Debug)]
pub struct BatchReport {
    pub requested: usize,
    pub artifacts: Vec<VideoArtifact>,
}

impl BatchReport {
    pub fn produced(&self) -> usize {
        self.artifacts.len()
    }
}

/// Drives `count` independent runs through the six-stage sequence.
/// A failed stage aborts only its own run; a failed publish only its
/// run's distribution.
pub struct Orchestrator {
    idea: Box<dyn IdeaGenerator>,
    script: Box<dyn ScriptWriter>,
    narration: Box<dyn NarrationSynthesizer>,
    media: Box<dyn MediaCollector>,
    composer: Box<dyn VideoComposer>,
    publisher: Box<dyn Publisher>,
    transient: TransientPaths,
    target_duration_secs: u32,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        idea: Box<dyn IdeaGenerator>,
        script: Box<dyn ScriptWriter>,
        narration: Box<dyn NarrationSynthesizer>,
        media: Box<dyn MediaCollector>,
        composer: Box<dyn VideoComposer>,
        publisher: Box<dyn Publisher>,
        transient: TransientPaths,
    ) -> Self {
        Self {
            idea,
            script,
            narration,
            media,
            composer,
            publisher,
            transient,
            target_duration_secs: 60,
        }
    }

    pub fn with_target_duration(mut self, secs: u32) -> Self {
        self.target_duration_secs = secs;
        self
    }

    pub async fn run(&self, count: usize, content: &ContentConfig) -> BatchReport {
        let mut artifacts = Vec::new();

        for run_index in 1..=count {
            info!("──── run {run_index}/{count} ────");
            let request = RunRequest {
                run_index,
                target: self.publisher.target(),
            };
            match self.run_one(request, content).await {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => error!("{e}"),
            }
        }

        info!("Pipeline complete: {}/{count} videos created", artifacts.len());
        BatchReport {
            requested: count,
            artifacts,
        }
    }

    async fn run_one(
        &self,
        request: RunRequest,
        content: &ContentConfig,
    ) -> Result<VideoArtifact, StageError> {
        let run_index = request.run_index;
        let mut state = RunState::Pending;

        info!("Step 1: generating content idea");
        let idea = self
            .idea
            .generate(content)
            .await
            .map_err(stage_err(run_index, Stage::Idea))?;
        advance(&mut state, RunState::IdeaGenerated);

        info!("Step 2: writing script");
        let script = self
            .script
            .write(&idea.concept, self.target_duration_secs, content)
            .await
            .map_err(stage_err(run_index, Stage::Script))?;
        info!("Script: {:.100}...", script.raw.replace('\n', " "));
        advance(&mut state, RunState::ScriptWritten);

        info!("Step 3: synthesizing narration");
        let narration = self
            .narration
            .synthesize(&script)
            .await
            .map_err(stage_err(run_index, Stage::Narration))?;
        if narration.durations.is_empty() {
            return Err(StageError::new(
                run_index,
                Stage::Narration,
                "narration produced no segments",
            ));
        }
        advance(&mut state, RunState::NarrationDone);
        info!(
            "Narration ready: {} segments ({})",
            narration.durations.len(),
            narration.combined_path.display()
        );

        info!("Step 4: collecting media");
        let mut media = self
            .media
            .collect(&idea.subject, narration.durations.len(), content)
            .await
            .map_err(stage_err(run_index, Stage::Media))?;
        if media.is_empty() {
            return Err(StageError::new(
                run_index,
                Stage::Media,
                "no media collected",
            ));
        }
        advance(&mut state, RunState::MediaCollected);

        // A count mismatch between images and narration segments is
        // recoverable: trim both sides to the shorter.
        let mut durations = narration.durations.clone();
        if media.len() != durations.len() {
            let common = media.len().min(durations.len());
            warn!(
                "run {run_index}: {} images vs {} durations, trimming to {common}",
                media.len(),
                durations.len()
            );
            media.trim_to(common);
            durations.truncate(common);
        }

        info!("Step 5: composing video");
        let output_name = output_basename(run_index, &idea.subject);
        let artifact = self
            .composer
            .compose(&media, &durations, &output_name)
            .await
            .map_err(stage_err(run_index, Stage::Compose))?;
        advance(&mut state, RunState::VideoComposed);

        // The video exists; reclaim the run's intermediates before
        // distribution regardless of how that goes.
        self.cleanup_transient(run_index).await;

        info!("Step 6: distributing to {}", request.target.as_str());
        let meta = build_metadata(&idea, content);
        match self.publisher.publish(&artifact, &meta).await {
            Ok(receipt) if receipt.success => {
                advance(&mut state, RunState::Published);
                match receipt.platform_id {
                    Some(id) => info!("run {run_index}: distribution successful ({id})"),
                    None => info!("run {run_index}: distribution successful"),
                }
            }
            Ok(_) => {
                advance(&mut state, RunState::PublishFailed);
                warn!("run {run_index}: publisher reported a non-success receipt");
            }
            Err(e) => {
                // Distribution failure never fails a run that produced
                // a video.
                advance(&mut state, RunState::PublishFailed);
                warn!("run {run_index}: distribution failed: {e}");
            }
        }

        debug_assert!(state.is_terminal());
        Ok(artifact)
    }

    /// Best-effort: failures are logged, never fatal, never retried.
    async fn cleanup_transient(&self, run_index: usize) {
        for dir in [&self.transient.audio_dir, &self.transient.images_dir] {
            if let Err(e) = clear_dir(dir).await {
                warn!("run {run_index}: cleanup of {} failed: {e:#}", dir.display());
            }
        }
        if self.transient.combined_audio.exists()
            && let Err(e) = tokio::fs::remove_file(&self.transient.combined_audio).await
        {
            warn!(
                "run {run_index}: cleanup of {} failed: {e:#}",
                self.transient.combined_audio.display()
            );
        }
    }
}

fn stage_err(run_index: usize, stage: Stage) -> impl FnOnce(anyhow::Error) -> StageError {
    move |e| StageError::new(run_index, stage, format!("{e:#}"))
}

fn build_metadata(idea: &Idea, content: &ContentConfig) -> PublishMetadata {
    PublishMetadata {
        title: idea.subject.clone(),
        body: format!(
            "Video about: {}\n\nConcept: {}",
            idea.subject, idea.concept
        ),
        caption: content.render_caption(&idea.subject, &idea.concept),
    }
}

/// Empty a directory without removing it.
async fn clear_dir(dir: &std::path::Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
