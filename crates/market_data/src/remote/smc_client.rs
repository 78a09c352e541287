use std::time::Duration;

use async_trait::async_trait;
use common::models::Signal;
use common::traits::{AnalysisGateway, AnalyzeRequest, GatewayError};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::{remote::analyze_response::AnalyzeResponse, traits::RemoteResponse};

const ANALYZE_PATH: &str = "v1/analyze";

/// HTTP client for the SMC analysis service.
#[derive(Clone)]
pub struct SmcClient {
    client: Client,
    endpoint: Url,
}

impl SmcClient {
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent("smc_signal_bot/0.1.0")
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: analyze_endpoint(base_url)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn analyze_endpoint(base_url: &Url) -> Result<Url, GatewayError> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(ANALYZE_PATH)
        .map_err(|e| GatewayError::Transport(format!("bad analysis URL: {}", e)))
}

fn map_reqwest(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_decode() {
        GatewayError::Decode(e.to_string())
    } else {
        GatewayError::Transport(e.to_string())
    }
}

#[async_trait]
impl AnalysisGateway for SmcClient {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<Option<Signal>, GatewayError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Analysis of {} failed with HTTP {}", request.symbol, status);
            return Err(GatewayError::Status(status.as_u16(), body));
        }

        let data = response
            .json::<AnalyzeResponse>()
            .await
            .map_err(map_reqwest)?;
        debug!("Analysis reply for {}: side={:?}", request.symbol, data.side);

        data.to_domain()
    }
}
