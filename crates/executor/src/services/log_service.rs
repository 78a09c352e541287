use async_trait::async_trait;
use common::traits::{Notifier, NotifyError};
use tracing::info;

/// Stand-in channel used when Telegram is disabled or not configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        info!("Notification (log only):\n{}", message);
        Ok(())
    }
}
