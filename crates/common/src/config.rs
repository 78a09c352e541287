use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;
use url::Url;

const DEFAULT_ANALYSIS_URL: &str = "http://localhost:50051";
const DEFAULT_SYMBOLS: &[&str; 6] = &[
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "ZECUSDT", "XRPUSDT", "SOLUSDT",
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be true or false, got {value:?}")]
    InvalidFlag { name: &'static str, value: String },
    #[error("{name} is not a valid socket address: {value:?}")]
    InvalidAddr { name: &'static str, value: String },
    #[error("TELEGRAM_CHAT_ID must be an integer, got {0:?}")]
    InvalidChatId(String),
    #[error("SCAN_SYMBOLS is empty")]
    NoSymbols,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub analysis_url: Url,
    pub exchange: String,
    pub timeframe: String,
    pub symbols: Vec<String>,
    pub scan_interval: Duration,
    pub analysis_timeout: Duration,
    pub notify_timeout: Duration,
    /// `None` when credentials are missing.
    pub telegram: Option<TelegramConfig>,
    pub notifications_enabled: bool,
    pub http_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let raw_url = var("ANALYSIS_URL").unwrap_or_else(|| DEFAULT_ANALYSIS_URL.to_string());
        let analysis_url = Url::parse(raw_url.trim()).map_err(|e| ConfigError::InvalidUrl {
            name: "ANALYSIS_URL",
            reason: e.to_string(),
        })?;

        let symbols = match var("SCAN_SYMBOLS") {
            Some(raw) => parse_symbols(&raw),
            None => DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        };
        if symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }

        let telegram = match (var("TELEGRAM_BOT_TOKEN"), var("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(raw_chat)) => {
                let chat_id = raw_chat
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ConfigError::InvalidChatId(raw_chat.clone()))?;
                Some(TelegramConfig { bot_token, chat_id })
            }
            _ => None,
        };

        let http_addr = match var("HTTP_ADDR") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidAddr {
                name: "HTTP_ADDR",
                value: raw,
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 9000)),
        };

        Ok(Self {
            analysis_url,
            exchange: var("ANALYSIS_EXCHANGE").unwrap_or_else(|| "binance".to_string()),
            timeframe: var("SCAN_TIMEFRAME").unwrap_or_else(|| "15m".to_string()),
            symbols,
            scan_interval: secs(var("SCAN_INTERVAL_SECS"), "SCAN_INTERVAL_SECS", 120)?,
            analysis_timeout: secs(var("ANALYSIS_TIMEOUT_SECS"), "ANALYSIS_TIMEOUT_SECS", 5)?,
            notify_timeout: secs(var("NOTIFY_TIMEOUT_SECS"), "NOTIFY_TIMEOUT_SECS", 10)?,
            telegram,
            notifications_enabled: flag(var("NOTIFICATIONS_ENABLED"), "NOTIFICATIONS_ENABLED", true)?,
            http_addr,
        })
    }
}

fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn secs(raw: Option<String>, name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Duration::from_secs(n)),
        _ => Err(ConfigError::InvalidNumber { name, value: raw }),
    }
}

fn flag(raw: Option<String>, name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { name, value: raw }),
    }
}
