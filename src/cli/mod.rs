mod auth;

use std::sync::Arc;

use anyhow::{Result, anyhow};
use console::style;

use crate::core::config::{AppConfig, ContentConfig};
use crate::core::llm::CompletionClient;
use crate::core::pipeline::types::PublishTarget;
use crate::core::pipeline::{Orchestrator, TransientPaths};
use crate::core::publish::build_publisher;
use crate::core::stages::compose::FfmpegComposer;
use crate::core::stages::idea::LlmIdeaGenerator;
use crate::core::stages::media::ImageCollector;
use crate::core::stages::narration::SpeechSynthesizer;
use crate::core::stages::script::LlmScriptWriter;
use crate::core::terminal::{self, print_error};
use crate::logging;

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("run") => run_pipeline(&args).await,
        Some("auth") => auth::run_auth_command(&args).await,
        Some("configs") => {
            list_configs();
            Ok(())
        }
        Some("help") | Some("--help") | Some("-h") | None => {
            print_help();
            Ok(())
        }
        Some(other) => {
            print_error(&format!("Unknown command: {other}"));
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    terminal::print_banner();

    println!(" {}", style("Commands").bold());
    println!("   run        Create and distribute videos");
    println!("   auth       Authorize the short-video platform channel");
    println!("   configs    List available content configurations");
    println!("   help       Show this help message");
    println!();
    println!(" {}", style("Run flags").bold());
    println!("   --config, -c <name>     Content configuration (default: cars)");
    println!("   --count, -n <n>         Number of videos to create (default: 1)");
    println!("   --publish-to <target>   mail | tiktok | none");
    println!("   --no-publish            Create videos without distributing");
    println!();
    println!(
        " {} {} run --config cars --count 5 --publish-to mail\n",
        style("Usage:").bold(),
        style("reelbot").green()
    );
}

fn list_configs() {
    let available = ContentConfig::list_available();
    if available.is_empty() {
        println!(
            "No content configs found. Add YAML files under {}/.",
            crate::core::config::CONTENT_CONFIG_DIR
        );
        return;
    }
    println!("Available content configs:");
    for name in available {
        match ContentConfig::from_name(&name) {
            Ok(config) => println!("  {:<20} {}", name, style(config.description).dim()),
            Err(_) => println!("  {:<20} {}", name, style("(invalid)").red()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunFlags {
    pub config: String,
    pub count: usize,
    pub publish_to: Option<String>,
    pub no_publish: bool,
}

pub(crate) fn parse_run_flags(args: &[String], start: usize) -> RunFlags {
    let mut flags = RunFlags {
        config: "cars".to_string(),
        count: 1,
        publish_to: None,
        no_publish: false,
    };
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    flags.config = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--count" | "-n" => {
                if i + 1 < args.len() {
                    flags.count = args[i + 1].parse().unwrap_or(1);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--publish-to" => {
                if i + 1 < args.len() {
                    flags.publish_to = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--no-publish" => {
                flags.no_publish = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    flags
}

/// `--no-publish` wins; otherwise the flag, then the content config's
/// default, then mail.
pub(crate) fn resolve_target(flags: &RunFlags, content: &ContentConfig) -> Result<PublishTarget> {
    if flags.no_publish {
        return Ok(PublishTarget::None);
    }
    let name = flags
        .publish_to
        .as_deref()
        .or_else(|| content.default_platform())
        .unwrap_or("mail");
    PublishTarget::from_flag(name).ok_or_else(|| anyhow!("Unknown publish target: {name}"))
}

async fn run_pipeline(args: &[String]) -> Result<()> {
    terminal::print_banner();
    let flags = parse_run_flags(args, 2);

    let content = match ContentConfig::from_name(&flags.config) {
        Ok(content) => content,
        Err(e) => {
            print_error(&format!("{e:#}"));
            let available = ContentConfig::list_available();
            if !available.is_empty() {
                println!("\nAvailable configs:");
                for name in available {
                    println!("  - {name}");
                }
            }
            return Err(anyhow!("invalid content config"));
        }
    };
    terminal::print_status(
        "Config",
        &format!("{} - {}", content.name, content.description),
    );
    terminal::print_status(
        "Images",
        &format!(
            "{} ({} shot templates)",
            content.image_generation.strategy,
            content.shot_count()
        ),
    );

    let target = resolve_target(&flags, &content)?;
    terminal::print_status("Publish to", target.as_str());

    // Everything up to here is fatal; from the first run on, failures
    // only ever cost their own run.
    let config = AppConfig::load()?;
    config.validate(target)?;
    config.ensure_directories()?;
    let log_path = logging::init(&config.logs_dir())?;
    terminal::print_status("Log file", &log_path.display().to_string());

    let count = flags.count.max(1);
    let orchestrator = build_orchestrator(&config, target)?;
    let report = orchestrator.run(count, &content).await;

    println!();
    terminal::print_success(&format!(
        "Created {}/{} video(s)",
        report.produced(),
        report.requested
    ));
    for (i, artifact) in report.artifacts.iter().enumerate() {
        println!(
            "  {}. {} ({:.1}s)",
            i + 1,
            artifact.path.display(),
            artifact.duration_secs
        );
    }
    Ok(())
}

fn build_orchestrator(config: &AppConfig, target: PublishTarget) -> Result<Orchestrator> {
    let completion = Arc::new(CompletionClient::new(config.openai_api_key.clone()));

    let idea = LlmIdeaGenerator::new(completion.clone());
    let script = LlmScriptWriter::new(completion);
    let narration = SpeechSynthesizer::new(
        config.openai_api_key.clone(),
        config.content.default_voice.clone(),
        config.audio_dir(),
        config.combined_narration_path(),
    );
    let media = ImageCollector::new(
        config.openai_api_key.clone(),
        config.pexels_api_key.clone(),
        config.video.width,
        config.video.height,
        config.images_dir(),
    );
    let composer = FfmpegComposer::new(
        config.video.width,
        config.video.height,
        config.video.fps,
        config.videos_dir(),
        config.combined_narration_path(),
    );
    let publisher = build_publisher(target, config)?;

    let transient = TransientPaths {
        audio_dir: config.audio_dir(),
        images_dir: config.images_dir(),
        combined_audio: config.combined_narration_path(),
    };

    Ok(Orchestrator::new(
        Box::new(idea),
        Box::new(script),
        Box::new(narration),
        Box::new(media),
        Box::new(composer),
        publisher,
        transient,
    )
    .with_target_duration(config.content.target_duration_secs))
}
