use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::Signal;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzeRequest {
    pub symbol: String,
    pub timeframe: String,
    pub exchange: String,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("analysis service returned HTTP {0}: {1}")]
    Status(u16, String),
    #[error("failed to decode analysis response: {0}")]
    Decode(String),
    #[error("invalid analysis response: {0}")]
    Invalid(String),
    #[error("analysis call timed out")]
    Timeout,
}

/// Remote procedure that computes a trading signal for one instrument.
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    /// `Ok(None)` means the service found no actionable setup.
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<Option<Signal>, GatewayError>;
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("delivery timed out")]
    Timeout,
}

/// Best-effort outbound message channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}
