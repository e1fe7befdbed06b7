//! Outbound alert delivery
//!
//! Delivery is best-effort: a failed send is logged by the caller and
//! never rolls back incident state. The webhook notifier POSTs a JSON
//! payload; the log notifier is the fallback when no webhook is
//! configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during alert delivery.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// A new-alert notification, pre-formatting.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AlertMessage {
    pub stream_name: String,
    pub incident_type: String,
    pub detected_at: DateTime<Utc>,
    pub details: String,
}

impl AlertMessage {
    /// The outbound message line: `ALERT: <type> <stream> at <time>. <details>`
    pub fn format(&self) -> String {
        format!(
            "ALERT: {} {} at {}. {}",
            self.incident_type,
            self.stream_name,
            self.detected_at.to_rfc3339(),
            self.details
        )
    }
}

/// Trait for alert delivery channels.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn send(&self, alert: &AlertMessage) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g. "webhook", "log").
    fn channel_name(&self) -> &str;
}

/// Delivers alerts as JSON over HTTP POST to a configured endpoint.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertNotifier for WebhookNotifier {
    async fn send(&self, alert: &AlertMessage) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "text": alert.format(),
            "stream_name": alert.stream_name,
            "incident_type": alert.incident_type,
            "detected_at": alert.detected_at.to_rfc3339(),
            "details": alert.details,
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        log::debug!("Webhook alert delivered for '{}'", alert.stream_name);
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Fallback channel: writes the alert line to the process log.
pub struct LogNotifier;

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn send(&self, alert: &AlertMessage) -> Result<(), NotifyError> {
        log::warn!("{}", alert.format());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
