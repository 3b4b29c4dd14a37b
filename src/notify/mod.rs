//! Best-effort notifications.
//!
//! Delivery never influences workflow results: the dispatcher sends after the
//! transaction has committed, on a spawned task, and only logs failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    SubmissionReceived,
    ReviewRequested,
    DecisionRecorded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Endpoint rejected notification with status {0}")]
    Rejected(u16),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            "Notification {:?} for {}: {}",
            notification.kind, notification.recipient, notification.data
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a mail relay or similar endpoint.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(notification).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected(status.as_u16()))
        }
    }
}

/// Fire-and-forget front for a [`Notifier`].
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Sends on a background task. Errors are logged, never returned.
    pub fn dispatch(&self, notification: Notification) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            let delivered = deliver(notifier.as_ref(), &notification).await;
            debug!(
                "Notification {:?} to {} delivered: {}",
                notification.kind, notification.recipient, delivered
            );
        });
    }

    pub fn dispatch_all(&self, notifications: impl IntoIterator<Item = Notification>) {
        for notification in notifications {
            self.dispatch(notification);
        }
    }
}

async fn deliver(notifier: &dyn Notifier, notification: &Notification) -> bool {
    match notifier.send(notification).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "Failed to send {:?} notification to {}: {}",
                notification.kind, notification.recipient, e
            );
            false
        }
    }
}
