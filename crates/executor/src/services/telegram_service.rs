use async_trait::async_trait;
use common::config::TelegramConfig;
use common::traits::{Notifier, NotifyError};
use teloxide::prelude::*;
use tracing::debug;

pub struct TelegramService {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramService {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            bot: Bot::new(config.bot_token.clone()),
            chat_id: ChatId(config.chat_id),
        }
    }
}

#[async_trait]
impl Notifier for TelegramService {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        self.bot
            .send_message(self.chat_id, message.to_string())
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        debug!("Telegram message delivered to chat {}", self.chat_id.0);
        Ok(())
    }
}
