use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::pipeline::types::PublishTarget;

pub const CONFIG_FILE: &str = "reelbot.toml";
pub const CONTENT_CONFIG_DIR: &str = "content_configs";

pub const OUTPUT_DIR: &str = "output";
pub const LOGS_DIR: &str = "logs";

/// Voices accepted by the speech endpoint. `default_voice = "random"`
/// picks one of these per run.
pub const AVAILABLE_VOICES: [&str; 6] = ["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 1280,
            fps: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    pub default_voice: String,
    pub target_duration_secs: u32,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            default_voice: "random".to_string(),
            target_duration_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailSettings {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub app_password: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            sender: String::new(),
            recipient: String::new(),
            app_password: String::new(),
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformSettings {
    #[serde(default)]
    pub client_key: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default = "default_privacy_level")]
    pub privacy_level: String,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            client_key: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            privacy_level: default_privacy_level(),
            token_file: default_token_file(),
        }
    }
}

fn default_privacy_level() -> String {
    "SELF_ONLY".to_string()
}

fn default_token_file() -> PathBuf {
    PathBuf::from("tokens.toml")
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub pexels_api_key: Option<String>,
    pub video: VideoSettings,
    pub content: ContentSettings,
    pub mail: Option<MailSettings>,
    pub platform: Option<PlatformSettings>,
}

impl AppConfig {
    /// Load `reelbot.toml` from the working directory. A missing file is
    /// not an error: secrets may arrive entirely via the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config: AppConfig = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("Invalid config: {}", path.display()))?
        } else {
            AppConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.openai_api_key = key;
        }
        if let Ok(key) = std::env::var("PEXELS_API_KEY") {
            self.pexels_api_key = Some(key);
        }
        if let Ok(password) = std::env::var("SMTP_APP_PASSWORD") {
            self.mail.get_or_insert_with(Default::default).app_password = password;
        }
        if let Ok(key) = std::env::var("PLATFORM_CLIENT_KEY") {
            self.platform.get_or_insert_with(Default::default).client_key = key;
        }
        if let Ok(secret) = std::env::var("PLATFORM_CLIENT_SECRET") {
            self.platform
                .get_or_insert_with(Default::default)
                .client_secret = secret;
        }
    }

    /// Fail fast before any run starts. Per-run failures never come
    /// through here.
    pub fn validate(&self, target: PublishTarget) -> Result<()> {
        let mut missing = Vec::new();

        if self.openai_api_key.is_empty() {
            missing.push("openai_api_key");
        }

        match target {
            PublishTarget::None => {}
            PublishTarget::Mail => match &self.mail {
                None => missing.push("[mail] section"),
                Some(mail) => {
                    if mail.sender.is_empty() {
                        missing.push("mail.sender");
                    }
                    if mail.recipient.is_empty() {
                        missing.push("mail.recipient");
                    }
                    if mail.app_password.is_empty() {
                        missing.push("mail.app_password");
                    }
                }
            },
            PublishTarget::Tiktok => match &self.platform {
                None => missing.push("[platform] section"),
                Some(platform) => {
                    if platform.client_key.is_empty() {
                        missing.push("platform.client_key");
                    }
                    if platform.client_secret.is_empty() {
                        missing.push("platform.client_secret");
                    }
                }
            },
        }

        if !missing.is_empty() {
            return Err(anyhow!(
                "Missing required configuration: {}",
                missing.join(", ")
            ));
        }

        if target == PublishTarget::Tiktok
            && let Some(platform) = &self.platform
            && !platform.token_file.exists()
        {
            return Err(anyhow!(
                "No platform tokens at {} - run `reelbot auth` first",
                platform.token_file.display()
            ));
        }

        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(OUTPUT_DIR)
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.output_dir().join("audio")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.output_dir().join("images")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.output_dir().join("videos")
    }

    pub fn logs_dir(&self) -> PathBuf {
        PathBuf::from(LOGS_DIR)
    }

    pub fn combined_narration_path(&self) -> PathBuf {
        self.output_dir().join("combined_narration.wav")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.output_dir(),
            self.audio_dir(),
            self.images_dir(),
            self.videos_dir(),
            self.logs_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

// ── Content configuration (named YAML bundles) ──

#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub content_idea: IdeaSection,
    pub story_writer: StorySection,
    pub image_generation: ImageSection,
    #[serde(default)]
    pub distribution: DistributionSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdeaSection {
    pub role: String,
    pub task: String,
    #[serde(default)]
    pub output_characteristics: Option<String>,
    #[serde(default)]
    pub examples: Vec<serde_yaml::Value>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_idea_temperature")]
    pub temperature: f32,
    #[serde(default = "default_subject_key")]
    pub subject_key: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_idea_temperature() -> f32 {
    1.1
}

fn default_subject_key() -> String {
    "subject".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorySection {
    pub role: String,
    #[serde(default)]
    pub structure: Option<Structure>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub output_characteristics: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub max_words: Option<u32>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_story_temperature")]
    pub temperature: f32,
}

fn default_story_temperature() -> f32 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Structure {
    Steps(Vec<String>),
    Freeform(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSection {
    #[serde(default = "default_image_strategy")]
    pub strategy: String,
    #[serde(default = "default_base_style")]
    pub base_style: String,
    #[serde(default)]
    pub shot_templates: Vec<ShotTemplate>,
    #[serde(default)]
    pub count: Option<usize>,
}

fn default_image_strategy() -> String {
    "pexels".to_string()
}

fn default_base_style() -> String {
    "photorealistic, high quality".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShotTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub template: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DistributionSection {
    pub default_platform: Option<String>,
    pub caption_template: String,
}

impl Default for DistributionSection {
    fn default() -> Self {
        Self {
            default_platform: None,
            caption_template: "Check out this video!".to_string(),
        }
    }
}

impl ContentConfig {
    /// Load a named config from `content_configs/<name>.yaml`.
    pub fn from_name(name: &str) -> Result<Self> {
        let mut path = Path::new(CONTENT_CONFIG_DIR).join(format!("{name}.yaml"));
        if !path.exists() {
            // The caller may have typed the extension already.
            path = Path::new(CONTENT_CONFIG_DIR).join(name);
        }
        if !path.exists() {
            return Err(anyhow!(
                "Content config not found: {name} (looked in {CONTENT_CONFIG_DIR}/)"
            ));
        }
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ContentConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid content config: {}", path.display()))?;
        Ok(config)
    }

    pub fn list_available() -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(CONTENT_CONFIG_DIR) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("yaml")
                    && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        names
    }

    /// Full prompt for the idea stage, assembled from the config sections.
    pub fn idea_prompt(&self) -> String {
        let section = &self.content_idea;
        let mut prompt = format!("# ROLE:\n{}\n\n# TASK:\n{}\n\n", section.role, section.task);

        if let Some(characteristics) = &section.output_characteristics {
            prompt.push_str(&format!("# OUTPUT CHARACTERISTICS:\n{characteristics}\n\n"));
        }

        if !section.examples.is_empty() {
            prompt.push_str("# EXAMPLES:\n\n");
            for (i, example) in section.examples.iter().enumerate() {
                let rendered = serde_yaml::to_string(example).unwrap_or_default();
                prompt.push_str(&format!("## Example {}:\n{}\n\n", i + 1, rendered.trim()));
            }
        }

        prompt
    }

    /// Full prompt for the script stage.
    pub fn script_prompt(&self, concept: &str, duration_secs: u32) -> String {
        let section = &self.story_writer;
        let mut prompt = format!("# ROLE:\n{}\n\n", section.role);

        prompt.push_str(&format!(
            "# TASK:\nWrite a {duration_secs}-second video script based on the following concept: \"{concept}\".\n\n"
        ));

        if let Some(structure) = &section.structure {
            prompt.push_str("Use this structure:\n");
            match structure {
                Structure::Steps(steps) => {
                    for step in steps {
                        prompt.push_str(&format!("- {step}\n"));
                    }
                }
                Structure::Freeform(text) => prompt.push_str(text),
            }
            prompt.push('\n');
        }

        if let Some(instructions) = &section.instructions {
            prompt.push_str(&format!("# INSTRUCTIONS:\n{instructions}\n\n"));
        }

        if let Some(characteristics) = &section.output_characteristics {
            prompt.push_str(&format!("# OUTPUT CHARACTERISTICS:\n{characteristics}\n\n"));
        }

        if let Some(tone) = &section.tone {
            prompt.push_str(&format!("Tone: {tone}\n"));
        }

        if let Some(max_words) = section.max_words {
            prompt.push_str(&format!("Max words: {max_words}\n"));
        }

        if !section.examples.is_empty() {
            prompt.push_str("\n# EXAMPLES:\n");
            for example in &section.examples {
                prompt.push_str(&format!("{example}\n\n"));
            }
        }

        prompt
    }

    /// Number of images to collect when the narration has no say yet.
    pub fn shot_count(&self) -> usize {
        self.image_generation
            .count
            .unwrap_or_else(|| self.image_generation.shot_templates.len())
    }

    pub fn default_platform(&self) -> Option<&str> {
        self.distribution.default_platform.as_deref()
    }

    /// Render the caption template, substituting `{subject}` and
    /// `{concept}` placeholders.
    pub fn render_caption(&self, subject: &str, concept: &str) -> String {
        self.distribution
            .caption_template
            .replace("{subject}", subject)
            .replace("{concept}", concept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
name: classics
description: Classic sports cars
content_idea:
  role: You are a car historian.
  task: Pick one iconic sports car.
  subject_key: car
  temperature: 1.4
story_writer:
  role: You write punchy narration.
  structure:
    - Hook
    - Three facts
    - Outro
  tone: energetic
  max_words: 150
image_generation:
  strategy: pexels
  shot_templates:
    - name: hero_front
      template: "{subject}, front three-quarter view, {base_style}"
    - name: side_profile
      template: "{subject}, side profile view, {base_style}"
distribution:
  default_platform: mail
  caption_template: "A look at {subject}!"
"#;

    #[test]
    fn content_config_parses_with_defaults() {
        let config: ContentConfig = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        assert_eq!(config.name, "classics");
        assert_eq!(config.content_idea.subject_key, "car");
        assert_eq!(config.content_idea.model, "gpt-4o-mini");
        assert_eq!(config.story_writer.max_words, Some(150));
        assert_eq!(config.shot_count(), 2);
        assert_eq!(config.default_platform(), Some("mail"));
    }

    #[test]
    fn idea_prompt_carries_role_and_task() {
        let config: ContentConfig = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        let prompt = config.idea_prompt();
        assert!(prompt.contains("# ROLE:\nYou are a car historian."));
        assert!(prompt.contains("# TASK:\nPick one iconic sports car."));
    }

    #[test]
    fn script_prompt_renders_structure_and_limits() {
        let config: ContentConfig = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        let prompt = config.script_prompt("the rise of the NSX", 60);
        assert!(prompt.contains("60-second video script"));
        assert!(prompt.contains("the rise of the NSX"));
        assert!(prompt.contains("- Hook\n"));
        assert!(prompt.contains("Tone: energetic"));
        assert!(prompt.contains("Max words: 150"));
    }

    #[test]
    fn caption_template_substitutes_placeholders() {
        let config: ContentConfig = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        assert_eq!(
            config.render_caption("Acura NSX", "ignored"),
            "A look at Acura NSX!"
        );
    }

    #[test]
    fn validate_requires_api_key() {
        let config = AppConfig {
            openai_api_key: String::new(),
            ..Default::default()
        };
        let err = config.validate(PublishTarget::None).unwrap_err();
        assert!(err.to_string().contains("openai_api_key"));
    }

    #[test]
    fn validate_requires_mail_fields_for_mail_target() {
        let config = AppConfig {
            openai_api_key: "sk-test".to_string(),
            mail: Some(MailSettings {
                sender: "bot@example.com".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.validate(PublishTarget::None).is_ok());
        let err = config.validate(PublishTarget::Mail).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("mail.recipient"));
        assert!(msg.contains("mail.app_password"));
        assert!(!msg.contains("mail.sender"));
    }
}
