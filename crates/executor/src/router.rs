use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use common::models::{Signal, SignalKey};
use serde::{Deserialize, Serialize};
use storage::SignalStore;
use tower_http::trace::TraceLayer;

/// Timeframes reported when a query does not name one.
pub const SUPPORTED_TIMEFRAMES: &[&str] = &["15m", "1h"];

#[derive(Debug, Deserialize)]
pub struct SignalQuery {
    pub timeframe: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SignalsResponse {
    One(Signal),
    Missing { signal: Option<Signal> },
    Many(Vec<Signal>),
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tracked: usize,
}

pub fn create_router(store: SignalStore) -> Router {
    Router::new()
        .route("/signals/{symbol}", get(get_signals))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// GET /signals/{symbol}[?timeframe=15m]
async fn get_signals(
    State(store): State<SignalStore>,
    Path(symbol): Path<String>,
    Query(query): Query<SignalQuery>,
) -> Json<SignalsResponse> {
    let timeframe = query.timeframe.filter(|tf| !tf.trim().is_empty());

    let response = match timeframe {
        Some(tf) => match store.get(&SignalKey::new(symbol, tf)).await {
            Some(signal) => SignalsResponse::One(signal),
            None => SignalsResponse::Missing { signal: None },
        },
        None => SignalsResponse::Many(store.get_many(&symbol, SUPPORTED_TIMEFRAMES).await),
    };
    Json(response)
}

/// GET /health
async fn health(State(store): State<SignalStore>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        tracked: store.len().await,
    })
}
