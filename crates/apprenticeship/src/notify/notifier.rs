use async_trait::async_trait;
use tracing::info;

use crate::registry::domain::ChannelId;

/// Sends a text message to an external recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel_id: &ChannelId, text: &str) -> Result<(), NotifyError>;
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("notification rejected by channel: {0}")]
    Rejected(String),
}

/// Fallback notifier used when no messaging credentials are configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, channel_id: &ChannelId, text: &str) -> Result<(), NotifyError> {
        info!(channel_id = %channel_id, chars = text.chars().count(), "notification logged (no channel configured)");
        Ok(())
    }
}
