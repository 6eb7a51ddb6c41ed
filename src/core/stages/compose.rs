use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::core::pipeline::types::{MediaSet, VideoArtifact, VideoComposer};
use crate::core::stages::run_ffmpeg;

/// Composition stage: one ffmpeg invocation turning the image/duration
/// pairs and the combined narration into the final container.
pub struct FfmpegComposer {
    width: u32,
    height: u32,
    fps: u32,
    videos_dir: PathBuf,
    audio_path: PathBuf,
}

impl FfmpegComposer {
    pub fn new(width: u32, height: u32, fps: u32, videos_dir: PathBuf, audio_path: PathBuf) -> Self {
        Self {
            width,
            height,
            fps,
            videos_dir,
            audio_path,
        }
    }
}

#[async_trait]
impl VideoComposer for FfmpegComposer {
    async fn compose(
        &self,
        media: &MediaSet,
        durations: &[f64],
        output_name: &str,
    ) -> Result<VideoArtifact> {
        if media.is_empty() || durations.is_empty() {
            bail!("Nothing to compose: no images or durations");
        }
        if media.len() != durations.len() {
            bail!(
                "Image/duration mismatch: {} images, {} durations",
                media.len(),
                durations.len()
            );
        }

        // The concat list lives beside the images so the demuxer
        // resolves bare filenames; it is swept with the rest of the
        // transient artifacts.
        let list_dir = media.images[0]
            .parent()
            .ok_or_else(|| anyhow!("image path has no parent directory"))?;
        let list_path = list_dir.join("frames.txt");

        let mut list = String::new();
        let mut last_name = "";
        for (img, duration) in media.images.iter().zip(durations) {
            let name = img
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("invalid image filename"))?;
            list.push_str(&format!("file '{name}'\nduration {duration:.3}\n"));
            last_name = name;
        }
        // The demuxer ignores the duration of the final entry unless the
        // file is listed once more.
        list.push_str(&format!("file '{last_name}'\n"));
        tokio::fs::write(&list_path, list).await?;

        let output_path = self.videos_dir.join(format!("{output_name}.mp4"));
        info!("Composing {} image slides", media.len());

        let list_arg = list_path.to_string_lossy().to_string();
        let audio_arg = self.audio_path.to_string_lossy().to_string();
        let out_arg = output_path.to_string_lossy().to_string();
        let scale = format!("scale={}:{}", self.width, self.height);
        let fps = self.fps.to_string();

        let has_audio = self.audio_path.exists();
        if !has_audio {
            warn!("Narration not found at {}", self.audio_path.display());
        }

        let mut args: Vec<&str> = vec!["-y", "-f", "concat", "-safe", "0", "-i", list_arg.as_str()];
        if has_audio {
            args.extend(["-i", audio_arg.as_str()]);
        }
        args.extend([
            "-vf",
            scale.as_str(),
            "-r",
            fps.as_str(),
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
        ]);
        if has_audio {
            args.extend(["-c:a", "aac", "-shortest"]);
        }
        args.extend(["-movflags", "+faststart", out_arg.as_str()]);

        run_ffmpeg(&args).await?;

        let duration_secs = durations.iter().sum();
        info!(
            "Video created: {} ({duration_secs:.1}s)",
            output_path.display()
        );
        Ok(VideoArtifact {
            path: output_path,
            duration_secs,
        })
    }
}
