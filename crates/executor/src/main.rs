use dotenvy::dotenv;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use common::config::AppConfig;
use common::logger;
use market_data::remote::SmcClient;
use storage::SignalStore;
use strategy::{IntervalTicker, Scanner};

mod router;
mod services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();
    info!("System starting up...");

    let config = AppConfig::from_env()?;
    info!(
        "Scanning {:?} on {} every {:?} via {}",
        config.symbols, config.timeframe, config.scan_interval, config.analysis_url
    );

    let store = SignalStore::new();
    let gateway = Arc::new(SmcClient::new(&config.analysis_url, config.analysis_timeout)?);
    let notifier = services::build_notifier(&config);

    let scanner = Scanner::new(gateway, store.clone(), notifier, config.symbols.clone())
        .with_timeframe(config.timeframe.clone())
        .with_exchange(config.exchange.clone())
        .with_call_timeout(config.analysis_timeout)
        .with_notify_timeout(config.notify_timeout);
    let scanner_handle = scanner.start(IntervalTicker::new(config.scan_interval));

    let listener = TcpListener::bind(config.http_addr).await?;
    info!("Signal API running on {}", config.http_addr);

    axum::serve(listener, router::create_router(store))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped. Waiting for scanner...");
    scanner_handle.stop().await?;
    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
