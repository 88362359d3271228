//! Outbound email
//!
//! Every message the workflow sends is a short plain-text note with exactly
//! one attached document.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("email credentials not configured")]
    NotConfigured,
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("invalid attachment content type: {0}")]
    ContentType(String),
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Bytes,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: EmailAttachment,
}

impl OutgoingEmail {
    /// Ask a reviewer to look at an original.
    pub fn review_request(to: &str, filename: &str, content: Bytes) -> Self {
        Self {
            to: to.to_string(),
            subject: "Please review the document".to_string(),
            body: "Kindly review the attached document and reply.".to_string(),
            attachment: EmailAttachment {
                filename: filename.to_string(),
                content_type: "application/octet-stream".to_string(),
                content,
            },
        }
    }

    /// Deliver the converted PDF.
    pub fn final_policy(to: &str, pdf_name: &str, content: Bytes) -> Self {
        Self {
            to: to.to_string(),
            subject: "Final Policy Document".to_string(),
            body: "Please find attached the final approved policy document in PDF format."
                .to_string(),
            attachment: EmailAttachment {
                filename: pdf_name.to_string(),
                content_type: "application/pdf".to_string(),
                content,
            },
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), NotifyError>;
}

/// SMTP over implicit TLS, authenticating with the configured account.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let (username, password) = config.credentials().ok_or(NotifyError::NotConfigured)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();
        Ok(Self {
            transport,
            from: username.parse()?,
        })
    }

    fn build_message(&self, email: OutgoingEmail) -> Result<Message, NotifyError> {
        let content_type = ContentType::parse(&email.attachment.content_type)
            .map_err(|e| NotifyError::ContentType(e.to_string()))?;
        let attachment = Attachment::new(email.attachment.filename)
            .body(email.attachment.content.to_vec(), content_type);

        let message = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(email.body))
                    .singlepart(attachment),
            )?;
        Ok(message)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[tracing::instrument(skip_all, fields(to = %email.to, attachment = %email.attachment.filename))]
    async fn send(&self, email: OutgoingEmail) -> Result<(), NotifyError> {
        let message = self.build_message(email)?;
        self.transport.send(message).await?;
        tracing::info!("Email sent");
        Ok(())
    }
}

/// Stand-in used when no SMTP account is configured; every send fails.
#[derive(Debug, Default)]
pub struct UnconfiguredNotifier;

#[async_trait]
impl Notifier for UnconfiguredNotifier {
    async fn send(&self, email: OutgoingEmail) -> Result<(), NotifyError> {
        tracing::debug!(to = %email.to, "Dropping email, SMTP is not configured");
        Err(NotifyError::NotConfigured)
    }
}

/// Build the notifier for this process. Missing credentials are not fatal.
pub fn from_config(config: &SmtpConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match SmtpNotifier::new(config) {
        Ok(notifier) => {
            tracing::info!(host = %config.host, port = config.port, "SMTP notifier configured");
            Ok(Arc::new(notifier))
        }
        Err(NotifyError::NotConfigured) => {
            tracing::warn!("EMAIL_USER/EMAIL_PASS not set; review and final-policy emails will fail");
            Ok(Arc::new(UnconfiguredNotifier))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config(username: Option<&str>) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 465,
            username: username.map(ToString::to_string),
            password: Some("secret".to_string()),
        }
    }

    #[test]
    fn test_review_request_attaches_original() {
        let email =
            OutgoingEmail::review_request("rev@example.com", "policy.docx", Bytes::from("doc"));
        assert_eq!(email.subject, "Please review the document");
        assert_eq!(email.attachment.filename, "policy.docx");
        assert_eq!(email.attachment.content_type, "application/octet-stream");
    }

    #[test]
    fn test_final_policy_attaches_pdf() {
        let email = OutgoingEmail::final_policy("rev@example.com", "policy.pdf", Bytes::new());
        assert_eq!(email.subject, "Final Policy Document");
        assert_eq!(email.attachment.content_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_missing_credentials_fall_back_to_failing_notifier() {
        let notifier = from_config(&smtp_config(None)).unwrap();
        let err = notifier
            .send(OutgoingEmail::final_policy(
                "rev@example.com",
                "policy.pdf",
                Bytes::new(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::NotConfigured));
    }

    #[tokio::test]
    async fn test_message_carries_attachment() {
        let notifier = SmtpNotifier::new(&smtp_config(Some("bot@example.com"))).unwrap();
        let message = notifier
            .build_message(OutgoingEmail::review_request(
                "rev@example.com",
                "policy.docx",
                Bytes::from("body"),
            ))
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Please review the document"));
        assert!(raw.contains("filename=\"policy.docx\""));
    }

    #[test]
    fn test_invalid_from_address_is_an_error() {
        assert!(matches!(
            SmtpNotifier::new(&smtp_config(Some("not an address"))),
            Err(NotifyError::Address(_))
        ));
    }
}
