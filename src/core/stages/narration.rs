use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::core::config::AVAILABLE_VOICES;
use crate::core::pipeline::types::{NarrationResult, NarrationSynthesizer, Script};
use crate::core::stages::{reset_dir, run_ffmpeg};

const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// Narration stage: one speech call per sentence, WAV segments on disk,
/// durations read back from the headers, then a single concat into the
/// combined track the composer consumes.
pub struct SpeechSynthesizer {
    api_key: String,
    client: Client,
    voice: String,
    audio_dir: PathBuf,
    combined_path: PathBuf,
}

impl SpeechSynthesizer {
    pub fn new(
        api_key: String,
        voice: String,
        audio_dir: PathBuf,
        combined_path: PathBuf,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client");
        Self {
            api_key,
            client,
            voice,
            audio_dir,
            combined_path,
        }
    }

    async fn speak(&self, voice: &str, sentence: &str) -> Result<bytes::Bytes> {
        let req = SpeechRequest {
            model: "tts-1",
            voice,
            input: sentence,
            response_format: "wav",
        };

        let res = self
            .client
            .post(SPEECH_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(anyhow!(
                "Speech API error: {}",
                res.text().await.unwrap_or_default()
            ));
        }

        Ok(res.bytes().await?)
    }
}

#[async_trait]
impl NarrationSynthesizer for SpeechSynthesizer {
    async fn synthesize(&self, script: &Script) -> Result<NarrationResult> {
        reset_dir(&self.audio_dir).await?;

        let voice = select_voice(&self.voice);
        info!(
            "Synthesizing {} sentences with voice {voice}",
            script.sentences.len()
        );

        let mut segments = Vec::new();
        let mut durations = Vec::new();

        for (i, sentence) in script.sentences.iter().enumerate() {
            let bytes = match self.speak(voice, sentence).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    // A failed sentence is dropped along with its slot so
                    // durations stay aligned with synthesized segments.
                    warn!("Narration failed for sentence {i}: {e:#}");
                    continue;
                }
            };

            let path = self.audio_dir.join(format!("segment_{i:03}.wav"));
            tokio::fs::write(&path, &bytes).await?;

            match wav_duration_seconds(&path) {
                Ok(duration) => {
                    durations.push(duration);
                    segments.push(path);
                }
                Err(e) => warn!("Unreadable narration segment {i}: {e:#}"),
            }
        }

        if durations.is_empty() {
            bail!("No narration segments were synthesized");
        }

        concat_segments(&self.audio_dir, &segments, &self.combined_path).await?;
        info!(
            "Combined narration written to {}",
            self.combined_path.display()
        );

        Ok(NarrationResult {
            durations,
            combined_path: self.combined_path.clone(),
        })
    }
}

pub fn wav_duration_seconds(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("open wav {}", path.display()))?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

fn select_voice(configured: &str) -> &str {
    if configured == "random" {
        return AVAILABLE_VOICES
            .choose(&mut rand::thread_rng())
            .expect("voice list is non-empty");
    }
    if let Some(voice) = AVAILABLE_VOICES.iter().find(|v| **v == configured) {
        return voice;
    }
    warn!("Unknown voice {configured:?}, picking at random");
    AVAILABLE_VOICES
        .choose(&mut rand::thread_rng())
        .expect("voice list is non-empty")
}

/// Concatenate WAV segments with the concat demuxer; stream-copy first,
/// re-encode if the copy refuses.
async fn concat_segments(audio_dir: &Path, segments: &[PathBuf], out: &Path) -> Result<()> {
    let list_path = audio_dir.join("segments.txt");
    let mut list = String::new();
    for segment in segments {
        let name = segment
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("invalid segment filename"))?;
        list.push_str(&format!("file '{name}'\n"));
    }
    tokio::fs::write(&list_path, list).await?;

    let list_arg = list_path.to_string_lossy().to_string();
    let out_arg = out.to_string_lossy().to_string();

    let copy_args = [
        "-y",
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
        list_arg.as_str(),
        "-c",
        "copy",
        out_arg.as_str(),
    ];
    if run_ffmpeg(&copy_args).await.is_ok() {
        return Ok(());
    }

    warn!("Stream-copy concat failed, re-encoding narration");
    let encode_args = [
        "-y",
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
        list_arg.as_str(),
        "-c:a",
        "pcm_s16le",
        out_arg.as_str(),
    ];
    run_ffmpeg(&encode_args).await
}
