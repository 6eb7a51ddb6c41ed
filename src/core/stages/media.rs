use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use base64::Engine;
use image::DynamicImage;
use image::imageops::FilterType;
use rand::seq::SliceRandom;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::config::{ContentConfig, ImageSection};
use crate::core::pipeline::types::{MediaCollector, MediaSet};
use crate::core::stages::reset_dir;

const STOCK_SEARCH_URL: &str = "https://api.pexels.com/v1/search";
const WEB_SEARCH_HOME: &str = "https://duckduckgo.com/";
const WEB_SEARCH_IMAGES: &str = "https://duckduckgo.com/i.js";
const GENERATION_URL: &str = "https://api.openai.com/v1/images/generations";

const WEB_SEARCH_TEMPLATES: [&str; 4] = [
    "{query}",
    "{query} photo",
    "{query} close-up",
    "{query} wide shot",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStrategy {
    Generative,
    StockPhoto,
    WebSearch,
}

impl ImageStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageStrategy::Generative => "generative",
            ImageStrategy::StockPhoto => "stock_photo",
            ImageStrategy::WebSearch => "web_search",
        }
    }
}

/// Acquisition order for a configured strategy name. Each link is tried
/// until one yields at least one image; an unknown name falls back to
/// the search-based pair rather than failing the run.
pub fn resolve_strategy_chain(configured: &str) -> Vec<ImageStrategy> {
    match configured {
        "flux-schnell" | "flux-dev" | "generative" => vec![
            ImageStrategy::Generative,
            ImageStrategy::StockPhoto,
            ImageStrategy::WebSearch,
        ],
        "pexels" | "stock" => vec![ImageStrategy::StockPhoto, ImageStrategy::WebSearch],
        "duckduckgo" | "web-search" => vec![ImageStrategy::WebSearch],
        other => {
            warn!("Unknown image strategy {other:?}, using stock-photo search");
            vec![ImageStrategy::StockPhoto, ImageStrategy::WebSearch]
        }
    }
}

/// Simplify a subject for search engines: parenthesized generation
/// codes out, dashes normalized, year ranges split.
pub fn simplify_query(query: &str) -> String {
    let no_parens = Regex::new(r"\([^)]*\)")
        .expect("static regex")
        .replace_all(query, "");
    let no_dashes = no_parens.replace('–', " ").replace('—', " ");
    let years = Regex::new(r"(\d{4})[-](\d{4})")
        .expect("static regex")
        .replace_all(&no_dashes, "$1 $2");
    years.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render generation prompts from the shot templates, cycling them when
/// more images than templates are needed.
pub fn render_shot_prompts(subject: &str, section: &ImageSection, count: usize) -> Vec<String> {
    if section.shot_templates.is_empty() {
        return vec![format!("{subject}, {}", section.base_style); count];
    }
    section
        .shot_templates
        .iter()
        .cycle()
        .take(count)
        .map(|shot| {
            shot.template
                .replace("{subject}", subject)
                .replace("{base_style}", &section.base_style)
        })
        .collect()
}

// ── Wire shapes ──

#[derive(Deserialize)]
struct StockSearchResponse {
    #[serde(default)]
    photos: Vec<StockPhoto>,
}

#[derive(Deserialize)]
struct StockPhoto {
    src: StockPhotoSrc,
}

#[derive(Deserialize)]
struct StockPhotoSrc {
    large: String,
}

#[derive(Deserialize)]
struct WebSearchResponse {
    #[serde(default)]
    results: Vec<WebSearchResult>,
}

#[derive(Deserialize)]
struct WebSearchResult {
    image: String,
}

#[derive(Deserialize)]
struct GenerationResponse {
    data: Vec<GenerationImage>,
}

#[derive(Deserialize)]
struct GenerationImage {
    b64_json: String,
}

/// Media stage: walks the strategy chain, saving every hit resized and
/// center-cropped to the target frame.
pub struct ImageCollector {
    search_client: Client,
    generation_client: Client,
    openai_api_key: String,
    pexels_api_key: Option<String>,
    width: u32,
    height: u32,
    images_dir: PathBuf,
}

impl ImageCollector {
    pub fn new(
        openai_api_key: String,
        pexels_api_key: Option<String>,
        width: u32,
        height: u32,
        images_dir: PathBuf,
    ) -> Self {
        // Short timeouts for search/download, a long one for generation.
        let search_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0")
            .build()
            .expect("reqwest client");
        let generation_client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client");
        Self {
            search_client,
            generation_client,
            openai_api_key,
            pexels_api_key,
            width,
            height,
            images_dir,
        }
    }

    async fn collect_stock(&self, query: &str, count: usize) -> Result<Vec<PathBuf>> {
        let api_key = self
            .pexels_api_key
            .as_ref()
            .ok_or_else(|| anyhow!("no stock-photo API key configured"))?;

        let per_page = (count * 3).min(80).to_string();
        let res = self
            .search_client
            .get(STOCK_SEARCH_URL)
            .header("Authorization", api_key)
            .query(&[
                ("query", query),
                ("per_page", per_page.as_str()),
                ("orientation", "landscape"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let parsed: StockSearchResponse = res.json().await?;
        info!("Stock search returned {} photos", parsed.photos.len());

        let mut paths = Vec::new();
        for photo in parsed.photos {
            if paths.len() >= count {
                break;
            }
            match self.download_and_save(&photo.src.large, paths.len()).await {
                Ok(path) => paths.push(path),
                Err(e) => warn!("Failed to fetch stock photo: {e:#}"),
            }
        }
        Ok(paths)
    }

    async fn collect_web_search(&self, query: &str, count: usize) -> Result<Vec<PathBuf>> {
        let mut templates = WEB_SEARCH_TEMPLATES.to_vec();
        templates.shuffle(&mut rand::thread_rng());

        let mut paths = Vec::new();
        for template in templates {
            if paths.len() >= count {
                break;
            }
            let search_query = template.replace("{query}", query);
            info!("Web image search: {search_query}");

            match self.web_search_page(&search_query).await {
                Ok(urls) => {
                    for url in urls {
                        if paths.len() >= count {
                            break;
                        }
                        match self.download_and_save(&url, paths.len()).await {
                            Ok(path) => paths.push(path),
                            Err(e) => warn!("Failed to fetch search result: {e:#}"),
                        }
                    }
                }
                Err(e) => warn!("Image search failed: {e:#}"),
            }

            // Polite gap between queries; search frontends rate-limit.
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
        Ok(paths)
    }

    /// One search round-trip: scrape the vqd token, then hit the image
    /// results endpoint with it.
    async fn web_search_page(&self, query: &str) -> Result<Vec<String>> {
        let home = self
            .search_client
            .get(WEB_SEARCH_HOME)
            .query(&[("q", query)])
            .send()
            .await?
            .text()
            .await?;

        let vqd = Regex::new(r#"vqd=['"]?([\d-]+)"#)
            .expect("static regex")
            .captures(&home)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| anyhow!("no vqd token in search page"))?;

        let res = self
            .search_client
            .get(WEB_SEARCH_IMAGES)
            .query(&[("l", "us-en"), ("o", "json"), ("q", query), ("vqd", vqd.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let parsed: WebSearchResponse = res.json().await?;
        Ok(parsed.results.into_iter().map(|r| r.image).collect())
    }

    async fn collect_generative(
        &self,
        subject: &str,
        section: &ImageSection,
        count: usize,
    ) -> Result<Vec<PathBuf>> {
        for shot in &section.shot_templates {
            debug!("shot template {}: {}", shot.name, shot.description);
        }
        let prompts = render_shot_prompts(subject, section, count);

        let mut paths = Vec::new();
        for prompt in prompts {
            let bytes = match self.generate_image(&prompt).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Image generation failed: {e:#}");
                    continue;
                }
            };
            match self.save_processed(&bytes, paths.len()) {
                Ok(path) => {
                    info!("Generated image {}/{count}", paths.len() + 1);
                    paths.push(path);
                }
                Err(e) => warn!("Discarding unreadable generated image: {e:#}"),
            }
        }
        Ok(paths)
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        let res = self
            .generation_client
            .post(GENERATION_URL)
            .header("Authorization", format!("Bearer {}", self.openai_api_key))
            .json(&serde_json::json!({
                "model": "dall-e-3",
                "prompt": prompt,
                "n": 1,
                "size": "1024x1024",
                "response_format": "b64_json",
            }))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(anyhow!(
                "Generation API error: {}",
                res.text().await.unwrap_or_default()
            ));
        }

        let parsed: GenerationResponse = res.json().await?;
        let payload = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("generation response contained no images"))?;
        base64::engine::general_purpose::STANDARD
            .decode(payload.b64_json)
            .context("decode generated image payload")
    }

    async fn download_and_save(&self, url: &str, index: usize) -> Result<PathBuf> {
        let bytes = self
            .search_client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        self.save_processed(&bytes, index)
    }

    fn save_processed(&self, bytes: &[u8], index: usize) -> Result<PathBuf> {
        let img = image::load_from_memory(bytes).context("decode image")?;
        let processed = resize_and_crop(&img, self.width, self.height);
        let path = self.images_dir.join(format!("image_{index}.jpg"));
        processed
            .to_rgb8()
            .save(&path)
            .with_context(|| format!("save {}", path.display()))?;
        Ok(path)
    }
}

/// Scale preserving aspect ratio so both target dimensions are covered,
/// then crop the center.
pub fn resize_and_crop(img: &DynamicImage, target_width: u32, target_height: u32) -> DynamicImage {
    let img_ratio = img.width() as f64 / img.height() as f64;
    let target_ratio = target_width as f64 / target_height as f64;

    let (new_width, new_height) = if img_ratio > target_ratio {
        (
            ((img_ratio * target_height as f64).round() as u32).max(target_width),
            target_height,
        )
    } else {
        (
            target_width,
            ((target_width as f64 / img_ratio).round() as u32).max(target_height),
        )
    };

    let resized = img.resize_exact(new_width, new_height, FilterType::Lanczos3);
    let left = (new_width - target_width) / 2;
    let top = (new_height - target_height) / 2;
    resized.crop_imm(left, top, target_width, target_height)
}

#[async_trait]
impl MediaCollector for ImageCollector {
    async fn collect(
        &self,
        subject: &str,
        count: usize,
        content: &ContentConfig,
    ) -> Result<MediaSet> {
        reset_dir(&self.images_dir).await?;

        let chain = resolve_strategy_chain(&content.image_generation.strategy);
        let query = simplify_query(subject);

        for strategy in &chain {
            if *strategy == ImageStrategy::StockPhoto && self.pexels_api_key.is_none() {
                warn!("No stock-photo API key, falling through to next strategy");
                continue;
            }

            info!("Collecting {count} images via {}", strategy.as_str());
            let result = match strategy {
                ImageStrategy::Generative => {
                    self.collect_generative(subject, &content.image_generation, count)
                        .await
                }
                ImageStrategy::StockPhoto => self.collect_stock(&query, count).await,
                ImageStrategy::WebSearch => self.collect_web_search(&query, count).await,
            };

            match result {
                Ok(paths) if !paths.is_empty() => {
                    info!("Collected {} images", paths.len());
                    return Ok(MediaSet { images: paths });
                }
                Ok(_) => warn!("{} yielded no images", strategy.as_str()),
                Err(e) => warn!("{} failed: {e:#}", strategy.as_str()),
            }
        }

        bail!("No images collected for {subject:?}");
    }
}
