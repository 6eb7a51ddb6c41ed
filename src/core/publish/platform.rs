use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::oauth;
use crate::core::pipeline::types::{PublishMetadata, PublishReceipt, PublishTarget, VideoArtifact};
use crate::core::publish::{PublishError, Publisher};
use crate::core::vault::{TokenPair, TokenStore};

const INIT_URL: &str = "https://open.tiktokapis.com/v2/post/publish/video/init/";
const STATUS_URL: &str = "https://open.tiktokapis.com/v2/post/publish/status/fetch/";

/// Platform-imposed caption ceiling, counted in characters.
pub const MAX_CAPTION_CHARS: usize = 2200;

pub const DEFAULT_POLL_ATTEMPTS: u32 = 30;
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(5);

/// Upload session handed out by Init; destroyed once a terminal status
/// is observed or the poll budget runs out.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub publish_id: String,
    pub upload_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Processing,
    Complete,
    Failed(String),
}

/// Error surface of the raw platform API. `Unauthorized` is the only
/// variant the state machine reacts to specially (one-shot refresh).
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Platform { code: String, message: String },
    Request(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            ApiError::Platform { code, message } => write!(f, "platform error {code}: {message}"),
            ApiError::Request(msg) => write!(f, "request failed: {msg}"),
        }
    }
}

impl From<ApiError> for PublishError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(msg) => PublishError::Auth(msg),
            ApiError::Platform { code, message } => {
                PublishError::Platform(format!("{code}: {message}"))
            }
            ApiError::Request(msg) => PublishError::Transport(msg),
        }
    }
}

/// Wire-level protocol operations, mockable for tests.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    async fn init_upload(
        &self,
        access_token: &str,
        caption: &str,
        privacy_level: &str,
        total_bytes: u64,
    ) -> Result<UploadSession, ApiError>;

    async fn upload_chunk(
        &self,
        upload_url: &str,
        body: Vec<u8>,
        total_bytes: u64,
    ) -> Result<(), ApiError>;

    async fn fetch_status(
        &self,
        access_token: &str,
        publish_id: &str,
    ) -> Result<UploadStatus, ApiError>;

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

/// Caption for Init: title plus description, hard-truncated to the
/// platform limit.
pub fn build_caption(title: &str, description: &str) -> String {
    let caption = if description.is_empty() {
        title.to_string()
    } else {
        format!("{title}\n{description}")
    };
    caption.chars().take(MAX_CAPTION_CHARS).collect()
}

/// Three-phase upload machine: Init (with one-shot credential refresh)
/// → single-chunk Upload → bounded status polling.
pub struct PlatformPublisher {
    api: Box<dyn PlatformApi>,
    store: TokenStore,
    privacy_level: String,
    poll_attempts: u32,
    poll_delay: Duration,
}

impl PlatformPublisher {
    pub fn new(api: Box<dyn PlatformApi>, store: TokenStore, privacy_level: String) -> Self {
        Self {
            api,
            store,
            privacy_level,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_delay: DEFAULT_POLL_DELAY,
        }
    }

    pub fn with_poll_budget(mut self, attempts: u32, delay: Duration) -> Self {
        self.poll_attempts = attempts;
        self.poll_delay = delay;
        self
    }

    /// Init phase. On an auth rejection: refresh the pair once, persist
    /// it, retry once. A second rejection is terminal.
    async fn init_with_refresh(
        &self,
        pair: &mut TokenPair,
        caption: &str,
        total_bytes: u64,
    ) -> Result<UploadSession, PublishError> {
        match self
            .api
            .init_upload(&pair.access_token, caption, &self.privacy_level, total_bytes)
            .await
        {
            Ok(session) => Ok(session),
            Err(ApiError::Unauthorized(msg)) => {
                warn!("Init rejected credential ({msg}), refreshing token pair");
                let refreshed = self
                    .api
                    .refresh_tokens(&pair.refresh_token)
                    .await
                    .map_err(|e| PublishError::Auth(format!("token refresh failed: {e}")))?;
                self.store
                    .persist(&refreshed)
                    .await
                    .map_err(|e| PublishError::Transport(format!("persist tokens: {e}")))?;
                *pair = refreshed;

                match self
                    .api
                    .init_upload(&pair.access_token, caption, &self.privacy_level, total_bytes)
                    .await
                {
                    Ok(session) => Ok(session),
                    Err(ApiError::Unauthorized(msg)) => Err(PublishError::Auth(msg)),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Poll until a terminal status or the attempt budget is gone.
    async fn poll_until_terminal(
        &self,
        access_token: &str,
        publish_id: &str,
    ) -> Result<(), PublishError> {
        for attempt in 1..=self.poll_attempts {
            let status = self
                .api
                .fetch_status(access_token, publish_id)
                .await
                .map_err(PublishError::from)?;

            match status {
                UploadStatus::Complete => {
                    info!("Processing complete after {attempt} polls");
                    return Ok(());
                }
                UploadStatus::Failed(reason) => {
                    return Err(PublishError::Platform(reason));
                }
                UploadStatus::Processing => {
                    if attempt < self.poll_attempts {
                        tokio::time::sleep(self.poll_delay).await;
                    }
                }
            }
        }

        Err(PublishError::Timeout {
            attempts: self.poll_attempts,
        })
    }
}

#[async_trait]
impl Publisher for PlatformPublisher {
    fn target(&self) -> PublishTarget {
        PublishTarget::Tiktok
    }

    async fn publish(
        &self,
        video: &VideoArtifact,
        meta: &PublishMetadata,
    ) -> Result<PublishReceipt, PublishError> {
        let caption = build_caption(&meta.title, &meta.caption);

        let bytes = tokio::fs::read(&video.path)
            .await
            .map_err(|e| PublishError::Transport(format!("read {}: {e}", video.path.display())))?;
        let total_bytes = bytes.len() as u64;

        let mut pair = self
            .store
            .load()
            .await
            .map_err(|e| PublishError::Auth(format!("no stored credentials: {e}")))?;

        let session = self
            .init_with_refresh(&mut pair, &caption, total_bytes)
            .await?;
        info!("Upload session {} initiated", session.publish_id);

        self.api
            .upload_chunk(&session.upload_url, bytes, total_bytes)
            .await
            .map_err(PublishError::from)?;
        info!("Uploaded {total_bytes} bytes in a single chunk");

        self.poll_until_terminal(&pair.access_token, &session.publish_id)
            .await?;

        Ok(PublishReceipt {
            success: true,
            platform_id: Some(session.publish_id),
        })
    }
}

// ── Wire implementation ──

#[derive(Serialize)]
struct InitRequest<'a> {
    post_info: PostInfo<'a>,
    source_info: SourceInfo,
}

#[derive(Serialize)]
struct PostInfo<'a> {
    title: &'a str,
    privacy_level: &'a str,
}

#[derive(Serialize)]
struct SourceInfo {
    source: &'static str,
    video_size: u64,
    chunk_size: u64,
    total_chunk_count: u32,
}

#[derive(Deserialize)]
struct InitResponse {
    data: Option<InitData>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct InitData {
    publish_id: String,
    upload_url: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    data: Option<StatusData>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct StatusData {
    status: String,
    #[serde(default)]
    fail_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

impl ErrorBody {
    fn is_auth(&self) -> bool {
        matches!(
            self.code.as_str(),
            "access_token_invalid" | "access_token_expired"
        )
    }
}

pub struct TiktokApi {
    client: Client,
    client_key: String,
    client_secret: String,
}

impl TiktokApi {
    pub fn new(client_key: String, client_secret: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client");
        Self {
            client,
            client_key,
            client_secret,
        }
    }
}

fn check_error(error: Option<ErrorBody>) -> Result<(), ApiError> {
    match error {
        // The platform reports success as error code "ok".
        Some(body) if body.code != "ok" => {
            if body.is_auth() {
                Err(ApiError::Unauthorized(body.message))
            } else {
                Err(ApiError::Platform {
                    code: body.code,
                    message: body.message,
                })
            }
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl PlatformApi for TiktokApi {
    async fn init_upload(
        &self,
        access_token: &str,
        caption: &str,
        privacy_level: &str,
        total_bytes: u64,
    ) -> Result<UploadSession, ApiError> {
        let req = InitRequest {
            post_info: PostInfo {
                title: caption,
                privacy_level,
            },
            source_info: SourceInfo {
                source: "FILE_UPLOAD",
                video_size: total_bytes,
                chunk_size: total_bytes,
                total_chunk_count: 1,
            },
        };

        let res = self
            .client
            .post(INIT_URL)
            .bearer_auth(access_token)
            .json(&req)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if res.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized("HTTP 401 from init".to_string()));
        }

        let parsed: InitResponse = res
            .json()
            .await
            .map_err(|e| ApiError::Request(format!("parse init response: {e}")))?;
        check_error(parsed.error)?;

        let data = parsed
            .data
            .ok_or_else(|| ApiError::Request("init response missing data".to_string()))?;
        Ok(UploadSession {
            publish_id: data.publish_id,
            upload_url: data.upload_url,
        })
    }

    async fn upload_chunk(
        &self,
        upload_url: &str,
        body: Vec<u8>,
        total_bytes: u64,
    ) -> Result<(), ApiError> {
        let res = self
            .client
            .put(upload_url)
            .header(
                "Content-Range",
                format!("bytes 0-{}/{}", total_bytes.saturating_sub(1), total_bytes),
            )
            .header("Content-Type", "video/mp4")
            .body(body)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !res.status().is_success() {
            return Err(ApiError::Request(format!(
                "upload returned HTTP {}",
                res.status()
            )));
        }
        Ok(())
    }

    async fn fetch_status(
        &self,
        access_token: &str,
        publish_id: &str,
    ) -> Result<UploadStatus, ApiError> {
        let res = self
            .client
            .post(STATUS_URL)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "publish_id": publish_id }))
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if res.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized("HTTP 401 from status".to_string()));
        }

        let parsed: StatusResponse = res
            .json()
            .await
            .map_err(|e| ApiError::Request(format!("parse status response: {e}")))?;
        check_error(parsed.error)?;

        let data = parsed
            .data
            .ok_or_else(|| ApiError::Request("status response missing data".to_string()))?;

        Ok(match data.status.as_str() {
            "PUBLISH_COMPLETE" => UploadStatus::Complete,
            "FAILED" => UploadStatus::Failed(
                data.fail_reason
                    .unwrap_or_else(|| "unspecified failure".to_string()),
            ),
            _ => UploadStatus::Processing,
        })
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        oauth::refresh_tokens(&self.client_key, &self.client_secret, refresh_token)
            .await
            .map_err(|e| ApiError::Request(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct MockApi {
        init_results: Mutex<VecDeque<Result<UploadSession, ApiError>>>,
        statuses: Mutex<VecDeque<UploadStatus>>,
        refresh_result: Mutex<Option<Result<TokenPair, ApiError>>>,
        upload_fails: bool,
        init_calls: AtomicUsize,
        upload_calls: AtomicUsize,
        status_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
    }

    impl MockApi {
        fn session() -> UploadSession {
            UploadSession {
                publish_id: "pub.123".to_string(),
                upload_url: "https://upload.example.com/slot".to_string(),
            }
        }

        fn push_init(&self, result: Result<UploadSession, ApiError>) {
            self.init_results.lock().unwrap().push_back(result);
        }

        fn push_statuses(&self, statuses: impl IntoIterator<Item = UploadStatus>) {
            self.statuses.lock().unwrap().extend(statuses);
        }

        fn set_refresh(&self, result: Result<TokenPair, ApiError>) {
            *self.refresh_result.lock().unwrap() = Some(result);
        }
    }

    #[async_trait]
    impl PlatformApi for MockApi {
        async fn init_upload(
            &self,
            _access_token: &str,
            _caption: &str,
            _privacy_level: &str,
            _total_bytes: u64,
        ) -> Result<UploadSession, ApiError> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            self.init_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Self::session()))
        }

        async fn upload_chunk(
            &self,
            _upload_url: &str,
            _body: Vec<u8>,
            _total_bytes: u64,
        ) -> Result<(), ApiError> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            if self.upload_fails {
                Err(ApiError::Request("connection reset".to_string()))
            } else {
                Ok(())
            }
        }

        async fn fetch_status(
            &self,
            _access_token: &str,
            _publish_id: &str,
        ) -> Result<UploadStatus, ApiError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(UploadStatus::Processing))
        }

        async fn refresh_tokens(&self, _refresh_token: &str) -> Result<TokenPair, ApiError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| {
                    Ok(TokenPair {
                        access_token: "act.new".to_string(),
                        refresh_token: "rft.new".to_string(),
                    })
                })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        video: VideoArtifact,
        meta: PublishMetadata,
        token_path: std::path::PathBuf,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let video_path = dir.path().join("001_test.mp4");
        std::fs::write(&video_path, b"not really mp4").unwrap();

        let token_path = dir.path().join("tokens.toml");
        TokenStore::new(&token_path)
            .persist(&TokenPair {
                access_token: "act.old".to_string(),
                refresh_token: "rft.old".to_string(),
            })
            .await
            .unwrap();

        Fixture {
            video: VideoArtifact {
                path: video_path,
                duration_secs: 12.0,
            },
            meta: PublishMetadata {
                title: "Test video".to_string(),
                body: "body".to_string(),
                caption: "caption".to_string(),
            },
            token_path,
            _dir: dir,
        }
    }

    fn publisher(api: std::sync::Arc<MockApi>, token_path: &std::path::Path) -> PlatformPublisher {
        PlatformPublisher::new(
            Box::new(SharedApi(api)),
            TokenStore::new(token_path),
            "SELF_ONLY".to_string(),
        )
        .with_poll_budget(4, Duration::ZERO)
    }

    // Box<dyn PlatformApi> needs ownership; the tests keep a handle to
    // the counters through an Arc.
    struct SharedApi(std::sync::Arc<MockApi>);

    #[async_trait]
    impl PlatformApi for SharedApi {
        async fn init_upload(
            &self,
            access_token: &str,
            caption: &str,
            privacy_level: &str,
            total_bytes: u64,
        ) -> Result<UploadSession, ApiError> {
            self.0
                .init_upload(access_token, caption, privacy_level, total_bytes)
                .await
        }

        async fn upload_chunk(
            &self,
            upload_url: &str,
            body: Vec<u8>,
            total_bytes: u64,
        ) -> Result<(), ApiError> {
            self.0.upload_chunk(upload_url, body, total_bytes).await
        }

        async fn fetch_status(
            &self,
            access_token: &str,
            publish_id: &str,
        ) -> Result<UploadStatus, ApiError> {
            self.0.fetch_status(access_token, publish_id).await
        }

        async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
            self.0.refresh_tokens(refresh_token).await
        }
    }

    #[tokio::test]
    async fn happy_path_returns_platform_id() {
        let fx = fixture().await;
        let api = std::sync::Arc::new(MockApi::default());
        api.push_statuses([UploadStatus::Complete]);

        let receipt = publisher(api.clone(), &fx.token_path)
            .publish(&fx.video, &fx.meta)
            .await
            .unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.platform_id.as_deref(), Some("pub.123"));
        assert_eq!(api.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.upload_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auth_error_triggers_exactly_one_refresh_and_retry() {
        let fx = fixture().await;
        let api = std::sync::Arc::new(MockApi::default());
        api.push_init(Err(ApiError::Unauthorized("expired".to_string())));
        api.push_init(Ok(MockApi::session()));
        api.push_statuses([UploadStatus::Complete]);

        let receipt = publisher(api.clone(), &fx.token_path)
            .publish(&fx.video, &fx.meta)
            .await
            .unwrap();

        assert!(receipt.success);
        assert_eq!(api.init_calls.load(Ordering::SeqCst), 2);
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);

        // The refreshed pair must have been persisted.
        let stored = TokenStore::new(&fx.token_path).load().await.unwrap();
        assert_eq!(stored.access_token, "act.new");
        assert_eq!(stored.refresh_token, "rft.new");
    }

    #[tokio::test]
    async fn second_auth_failure_is_terminal_with_no_third_attempt() {
        let fx = fixture().await;
        let api = std::sync::Arc::new(MockApi::default());
        api.push_init(Err(ApiError::Unauthorized("expired".to_string())));
        api.push_init(Err(ApiError::Unauthorized("still expired".to_string())));

        let err = publisher(api.clone(), &fx.token_path)
            .publish(&fx.video, &fx.meta)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Auth(_)));
        assert_eq!(api.init_calls.load(Ordering::SeqCst), 2);
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.upload_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_failure_is_terminal() {
        let fx = fixture().await;
        let api = std::sync::Arc::new(MockApi::default());
        api.push_init(Err(ApiError::Unauthorized("expired".to_string())));
        api.set_refresh(Err(ApiError::Request("refresh endpoint down".to_string())));

        let err = publisher(api.clone(), &fx.token_path)
            .publish(&fx.video, &fx.meta)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Auth(_)));
        assert_eq!(api.init_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_auth_init_error_is_not_retried() {
        let fx = fixture().await;
        let api = std::sync::Arc::new(MockApi::default());
        api.push_init(Err(ApiError::Platform {
            code: "spam_risk_too_many_posts".to_string(),
            message: "daily limit".to_string(),
        }));

        let err = publisher(api.clone(), &fx.token_path)
            .publish(&fx.video, &fx.meta)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Platform(_)));
        assert_eq!(api.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upload_transport_failure_is_terminal_and_skips_polling() {
        let fx = fixture().await;
        let api = std::sync::Arc::new(MockApi {
            upload_fails: true,
            ..Default::default()
        });

        let err = publisher(api.clone(), &fx.token_path)
            .publish(&fx.video, &fx.meta)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Transport(_)));
        assert_eq!(api.upload_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn poll_stops_at_first_terminal_status() {
        let fx = fixture().await;
        let api = std::sync::Arc::new(MockApi::default());
        api.push_statuses([
            UploadStatus::Processing,
            UploadStatus::Processing,
            UploadStatus::Complete,
        ]);

        let receipt = publisher(api.clone(), &fx.token_path)
            .publish(&fx.video, &fx.meta)
            .await
            .unwrap();

        assert!(receipt.success);
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn poll_budget_exhaustion_is_a_timeout() {
        let fx = fixture().await;
        let api = std::sync::Arc::new(MockApi::default());
        // Status queue left empty: every poll sees Processing.

        let err = publisher(api.clone(), &fx.token_path)
            .publish(&fx.video, &fx.meta)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Timeout { attempts: 4 }));
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn failed_status_surfaces_platform_reason() {
        let fx = fixture().await;
        let api = std::sync::Arc::new(MockApi::default());
        api.push_statuses([
            UploadStatus::Processing,
            UploadStatus::Failed("frame_rate_check_failed".to_string()),
        ]);

        let err = publisher(api.clone(), &fx.token_path)
            .publish(&fx.video, &fx.meta)
            .await
            .unwrap_err();

        match err {
            PublishError::Platform(reason) => assert_eq!(reason, "frame_rate_check_failed"),
            other => panic!("expected platform error, got {other:?}"),
        }
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn caption_is_truncated_to_the_platform_limit() {
        let title = "t".repeat(2000);
        let description = "d".repeat(1000);
        let caption = build_caption(&title, &description);
        assert_eq!(caption.chars().count(), MAX_CAPTION_CHARS);
        assert!(caption.starts_with(&title));
    }

    #[test]
    fn short_caption_is_left_alone() {
        assert_eq!(build_caption("Title", ""), "Title");
        assert_eq!(build_caption("Title", "Desc"), "Title\nDesc");
    }
}
