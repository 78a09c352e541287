use common::models::{Side, Signal};
use common::traits::GatewayError;
use serde::Deserialize;

use crate::traits::RemoteResponse;

/// Wire reply of the analysis service. Every field may be absent; an empty
/// object is how the service says "no setup".
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzeResponse {
    pub symbol: String,
    pub timeframe: String,
    pub side: String,
    pub entry_low: f64,
    pub entry_high: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl RemoteResponse<Option<Signal>> for AnalyzeResponse {
    fn to_domain(&self) -> Result<Option<Signal>, GatewayError> {
        if self.side.trim().is_empty() {
            return Ok(None);
        }

        let side = self
            .side
            .parse::<Side>()
            .map_err(|e| GatewayError::Invalid(e.to_string()))?;

        let levels = [
            ("entry_low", self.entry_low),
            ("entry_high", self.entry_high),
            ("stop_loss", self.stop_loss),
            ("take_profit", self.take_profit),
        ];
        if let Some((name, _)) = levels.iter().find(|(_, v)| !v.is_finite()) {
            return Err(GatewayError::Invalid(format!("{} is not finite", name)));
        }

        if self.entry_low > self.entry_high {
            return Err(GatewayError::Invalid(format!(
                "entry_low {} above entry_high {}",
                self.entry_low, self.entry_high
            )));
        }

        Ok(Some(Signal {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            side,
            entry_low: self.entry_low,
            entry_high: self.entry_high,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
        }))
    }
}
