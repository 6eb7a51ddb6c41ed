pub mod compose;
pub mod idea;
pub mod media;
pub mod narration;
pub mod script;

use anyhow::{Result, anyhow};
use tokio::process::Command;

/// Run ffmpeg with the given arguments, surfacing stderr on failure.
pub(crate) async fn run_ffmpeg(args: &[&str]) -> Result<()> {
    let output = Command::new("ffmpeg")
        .args(args)
        .output()
        .await
        .map_err(|e| anyhow!("failed to launch ffmpeg: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(5)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        return Err(anyhow!("ffmpeg exited with {}: {}", output.status, tail));
    }
    Ok(())
}

/// Clear and recreate a per-run working directory. Runs are sequential,
/// so there is never a concurrent writer.
pub(crate) async fn reset_dir(dir: &std::path::Path) -> Result<()> {
    if dir.exists() {
        tokio::fs::remove_dir_all(dir).await?;
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}
