pub mod log_service;
pub mod telegram_service;

use std::sync::Arc;

use common::config::AppConfig;
use common::traits::Notifier;
use tracing::{info, warn};

use log_service::LogNotifier;
use telegram_service::TelegramService;

pub fn build_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    if !config.notifications_enabled {
        warn!("Notifications disabled - signals will only be logged");
        return Arc::new(LogNotifier);
    }

    match &config.telegram {
        Some(telegram) => {
            info!("Telegram configured - signals will be sent");
            Arc::new(TelegramService::new(telegram))
        }
        None => {
            warn!("Telegram not configured - signals will only be logged");
            warn!("    Set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID");
            Arc::new(LogNotifier)
        }
    }
}
