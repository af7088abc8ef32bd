//! Delivery sinks: the outbound capability of the dispatch layer

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use tokio::sync::Mutex;

use super::Notification;
use crate::error::DeliveryError;

/// Something that can deliver a notification to its destination
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Sink that only logs; useful when no dispatch layer is attached
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl DeliverySink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        tracing::info!(
            destination = %notification.destination,
            session_id = %notification.session_id,
            kind = %notification.kind,
            has_attachment = notification.attachment.is_some(),
            "Relay notification"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookAttachment<'a> {
    mime: &'a str,
    filename: &'a str,
    data_base64: String,
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    destination: &'a str,
    session_id: &'a str,
    kind: &'a str,
    text: &'a str,
    attachment: Option<WebhookAttachment<'a>>,
}

/// Sink that POSTs each notification as JSON to a fixed URL
pub struct WebhookSink {
    url: String,
    http_client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            url: url.into(),
            http_client,
        }
    }
}

#[async_trait]
impl DeliverySink for WebhookSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let body = WebhookBody {
            destination: &notification.destination,
            session_id: &notification.session_id,
            kind: &notification.kind,
            text: &notification.text,
            attachment: notification
                .attachment
                .as_ref()
                .map(|a| WebhookAttachment {
                    mime: &a.mime,
                    filename: &a.filename,
                    data_base64: STANDARD.encode(&a.bytes),
                }),
        };

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

/// In-memory sink that records deliveries (for tests and local runs)
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    delivered: Arc<Mutex<Vec<Notification>>>,
    failing: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every delivery fails with a transport error
    pub fn failing() -> Self {
        Self {
            delivered: Arc::default(),
            failing: true,
        }
    }

    pub async fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().await.clone()
    }

    /// Poll until at least `count` notifications arrived or `timeout` passes
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Notification> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let delivered = self.delivered().await;
            if delivered.len() >= count || tokio::time::Instant::now() >= deadline {
                return delivered;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl DeliverySink for MemorySink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        if self.failing {
            return Err(DeliveryError::Transport("memory sink set to fail".into()));
        }
        self.delivered.lock().await.push(notification.clone());
        Ok(())
    }
}
