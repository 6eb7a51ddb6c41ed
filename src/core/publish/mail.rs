use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Body, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::core::config::MailSettings;
use crate::core::pipeline::types::{PublishMetadata, PublishReceipt, PublishTarget, VideoArtifact};
use crate::core::publish::{PublishError, Publisher};

/// Mail channel: one delivery attempt, video attached. A transport
/// failure is terminal for this run's distribution.
pub struct MailPublisher {
    settings: MailSettings,
}

impl MailPublisher {
    pub fn new(settings: MailSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Publisher for MailPublisher {
    fn target(&self) -> PublishTarget {
        PublishTarget::Mail
    }

    async fn publish(
        &self,
        video: &VideoArtifact,
        meta: &PublishMetadata,
    ) -> Result<PublishReceipt, PublishError> {
        let bytes = tokio::fs::read(&video.path)
            .await
            .map_err(|e| PublishError::Transport(format!("read {}: {e}", video.path.display())))?;

        let filename = video
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "video.mp4".to_string());

        let content_type = ContentType::parse("video/mp4")
            .map_err(|e| PublishError::Transport(format!("content type: {e}")))?;
        let attachment = Attachment::new(filename).body(Body::new(bytes), content_type);

        let message = Message::builder()
            .from(
                self.settings
                    .sender
                    .parse()
                    .map_err(|e| PublishError::Transport(format!("sender address: {e}")))?,
            )
            .to(self
                .settings
                .recipient
                .parse()
                .map_err(|e| PublishError::Transport(format!("recipient address: {e}")))?)
            .subject(&meta.title)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(meta.body.clone()))
                    .singlepart(attachment),
            )
            .map_err(|e| PublishError::Transport(format!("build message: {e}")))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.smtp_host)
            .map_err(|e| PublishError::Transport(format!("smtp relay: {e}")))?
            .credentials(Credentials::new(
                self.settings.sender.clone(),
                self.settings.app_password.clone(),
            ))
            .build();

        info!("Sending mail to {}", self.settings.recipient);
        mailer
            .send(message)
            .await
            .map_err(|e| PublishError::Transport(format!("smtp send: {e}")))?;

        Ok(PublishReceipt {
            success: true,
            platform_id: None,
        })
    }
}
