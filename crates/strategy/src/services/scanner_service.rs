use std::sync::Arc;
use std::time::Duration;

use common::models::Signal;
use common::traits::{AnalysisGateway, AnalyzeRequest, GatewayError, Notifier, NotifyError};
use storage::SignalStore;
use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
    time,
};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::{change_detection::signal_changed, formatter::format_signal_message, ticker::Ticker};

pub const DEFAULT_TIMEFRAME: &str = "15m";
pub const DEFAULT_EXCHANGE: &str = "binance";
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-tick counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub skipped: usize,
    pub notified: usize,
    pub notify_failed: usize,
    pub saved: usize,
}

enum PairOutcome {
    Skipped,
    Unchanged,
    Notified,
    NotifyFailed,
}

/// Polls the analysis service for every configured pair on each tick and
/// alerts on materially new signals.
pub struct Scanner {
    gateway: Arc<dyn AnalysisGateway>,
    store: SignalStore,
    notifier: Arc<dyn Notifier>,
    pairs: Vec<String>,
    timeframe: String,
    exchange: String,
    call_timeout: Duration,
    notify_timeout: Duration,
}

impl Scanner {
    pub fn new(
        gateway: Arc<dyn AnalysisGateway>,
        store: SignalStore,
        notifier: Arc<dyn Notifier>,
        pairs: Vec<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            notifier,
            pairs,
            timeframe: DEFAULT_TIMEFRAME.to_string(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn with_timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.timeframe = timeframe.into();
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Spawns the scan loop. One scan runs per tick; ticks are never
    /// processed concurrently.
    pub fn start<T>(self, mut ticker: T) -> ScannerHandle
    where
        T: Ticker + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!("Starting Scanner for {} symbols", self.pairs.len());

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => {
                        info!("Scanner shutdown requested.");
                        break;
                    }
                    more = ticker.tick() => {
                        if !more {
                            info!("Tick source closed. Stopping scanner.");
                            break;
                        }
                        self.scan_once().await;
                    }
                }
            }
        });

        ScannerHandle {
            shutdown_tx,
            handle,
        }
    }

    /// Runs a single pass over all configured pairs, in order.
    pub async fn scan_once(&self) -> ScanReport {
        let span = info_span!("scan", scan_id = %Uuid::new_v4());
        self.scan_pairs().instrument(span).await
    }

    async fn scan_pairs(&self) -> ScanReport {
        info!("Scanning market...");
        let mut report = ScanReport::default();

        for pair in &self.pairs {
            report.scanned += 1;
            match self.scan_pair(pair).await {
                PairOutcome::Skipped => report.skipped += 1,
                PairOutcome::Unchanged => report.saved += 1,
                PairOutcome::Notified => {
                    report.notified += 1;
                    report.saved += 1;
                }
                PairOutcome::NotifyFailed => {
                    report.notify_failed += 1;
                    report.saved += 1;
                }
            }
        }

        info!(
            "Scan done: scanned={} skipped={} notified={} notify_failed={} saved={}",
            report.scanned, report.skipped, report.notified, report.notify_failed, report.saved
        );
        report
    }

    async fn scan_pair(&self, pair: &str) -> PairOutcome {
        let signal = match self.fetch(pair).await {
            Ok(Some(signal)) => signal,
            Ok(None) => {
                debug!("No setup for {}", pair);
                return PairOutcome::Skipped;
            }
            Err(e) => {
                warn!("Skipping {}: {}", pair, e);
                return PairOutcome::Skipped;
            }
        };

        let previous = self.store.get(&signal.key()).await;
        let should_notify = match &previous {
            None => true,
            Some(prev) => signal_changed(prev, &signal),
        };

        let outcome = if should_notify {
            match self.notify(&signal).await {
                Ok(()) => {
                    info!("Signal sent for {}: {}", pair, signal.side);
                    PairOutcome::Notified
                }
                Err(e) => {
                    error!("Failed to send notification for {}: {}", pair, e);
                    PairOutcome::NotifyFailed
                }
            }
        } else {
            debug!("No material change for {}", pair);
            PairOutcome::Unchanged
        };

        self.store.save(signal).await;
        outcome
    }

    /// Calls the gateway under the per-call timeout and pins the reply to the
    /// requested key.
    async fn fetch(&self, pair: &str) -> Result<Option<Signal>, GatewayError> {
        let request = AnalyzeRequest {
            symbol: pair.to_string(),
            timeframe: self.timeframe.clone(),
            exchange: self.exchange.clone(),
        };

        let reply = match time::timeout(self.call_timeout, self.gateway.analyze(&request)).await {
            Ok(result) => result?,
            Err(_) => return Err(GatewayError::Timeout),
        };

        Ok(reply.map(|mut signal| {
            if signal.symbol != request.symbol || signal.timeframe != request.timeframe {
                if !signal.symbol.is_empty() || !signal.timeframe.is_empty() {
                    warn!(
                        "Reply for {}@{} labelled {}@{}; keeping requested key",
                        request.symbol, request.timeframe, signal.symbol, signal.timeframe
                    );
                }
                signal.symbol = request.symbol;
                signal.timeframe = request.timeframe;
            }
            signal
        }))
    }

    async fn notify(&self, signal: &Signal) -> Result<(), NotifyError> {
        let message = format_signal_message(signal);
        match time::timeout(self.notify_timeout, self.notifier.send(&message)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout),
        }
    }
}

/// Owns the running scan task. Dropping the handle also stops the loop at
/// the next tick boundary.
pub struct ScannerHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ScannerHandle {
    /// Requests shutdown and waits for the in-flight tick, if any, to finish.
    pub async fn stop(self) -> Result<(), JoinError> {
        let _ = self.shutdown_tx.send(true);
        self.handle.await
    }

    /// Waits for the loop to end on its own, i.e. when the ticker closes.
    pub async fn join(self) -> Result<(), JoinError> {
        let Self {
            shutdown_tx,
            handle,
        } = self;
        let result = handle.await;
        drop(shutdown_tx);
        result
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticker::ChannelTicker;
    use async_trait::async_trait;
    use common::models::{Side, SignalKey};
    use mockall::mock;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    mock! {
        pub Gateway {}

        #[async_trait]
        impl AnalysisGateway for Gateway {
            async fn analyze(&self, request: &AnalyzeRequest) -> Result<Option<Signal>, GatewayError>;
        }
    }

    mock! {
        pub Channel {}

        #[async_trait]
        impl Notifier for Channel {
            async fn send(&self, message: &str) -> Result<(), NotifyError>;
        }
    }

    struct HangingGateway;

    #[async_trait]
    impl AnalysisGateway for HangingGateway {
        async fn analyze(&self, _: &AnalyzeRequest) -> Result<Option<Signal>, GatewayError> {
            std::future::pending().await
        }
    }

    struct HangingChannel;

    #[async_trait]
    impl Notifier for HangingChannel {
        async fn send(&self, _: &str) -> Result<(), NotifyError> {
            std::future::pending().await
        }
    }

    type Reply = Result<Option<Signal>, GatewayError>;

    fn signal(symbol: &str, side: Side, entry_low: f64, entry_high: f64) -> Signal {
        Signal {
            symbol: symbol.into(),
            timeframe: "15m".into(),
            side,
            entry_low,
            entry_high,
            stop_loss: 98.0,
            take_profit: 110.0,
        }
    }

    /// Gateway answering from a fixed script, one reply per call.
    fn scripted_gateway(replies: Vec<Reply>) -> MockGateway {
        let mut replies = VecDeque::from(replies);
        let mut gateway = MockGateway::new();
        gateway
            .expect_analyze()
            .returning(move |_| replies.pop_front().expect("gateway called more than scripted"));
        gateway
    }

    fn recording_channel() -> (MockChannel, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let log = sent.clone();
        let mut channel = MockChannel::new();
        channel.expect_send().returning(move |msg| {
            log.lock().unwrap().push(msg.to_string());
            Ok(())
        });
        (channel, sent)
    }

    fn build_scanner(
        gateway: impl AnalysisGateway + 'static,
        channel: impl Notifier + 'static,
        pairs: &[&str],
    ) -> (Scanner, SignalStore) {
        let store = SignalStore::new();
        let scanner = Scanner::new(
            Arc::new(gateway),
            store.clone(),
            Arc::new(channel),
            pairs.iter().map(|p| p.to_string()).collect(),
        );
        (scanner, store)
    }

    #[tokio::test]
    async fn first_signal_notifies_once_and_saves() {
        let s = signal("BTCUSDT", Side::Long, 100.0, 102.0);
        let gateway = scripted_gateway(vec![Ok(Some(s.clone()))]);
        let (channel, sent) = recording_channel();
        let (scanner, store) = build_scanner(gateway, channel, &["BTCUSDT"]);

        let report = scanner.scan_once().await;

        assert_eq!(
            report,
            ScanReport {
                scanned: 1,
                skipped: 0,
                notified: 1,
                notify_failed: 0,
                saved: 1
            }
        );
        assert_eq!(sent.lock().unwrap().len(), 1);
        assert!(sent.lock().unwrap()[0].contains("Symbol: BTCUSDT"));
        assert_eq!(store.get(&s.key()).await, Some(s));
    }

    #[tokio::test]
    async fn empty_and_failed_replies_are_skipped() {
        let gateway = scripted_gateway(vec![
            Ok(None),
            Err(GatewayError::Transport("connection refused".into())),
            Err(GatewayError::Invalid("unknown side".into())),
        ]);
        let mut channel = MockChannel::new();
        channel.expect_send().never();
        let (scanner, store) = build_scanner(gateway, channel, &["BTCUSDT", "ETHUSDT", "SOLUSDT"]);

        let report = scanner.scan_once().await;

        assert_eq!(report.scanned, 3);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.saved, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn small_drift_updates_store_without_notifying() {
        let first = signal("BTCUSDT", Side::Long, 100.0, 102.0);
        let drift = signal("BTCUSDT", Side::Long, 100.005, 102.005);
        let gateway = scripted_gateway(vec![Ok(Some(first)), Ok(Some(drift.clone()))]);
        let (channel, sent) = recording_channel();
        let (scanner, store) = build_scanner(gateway, channel, &["BTCUSDT"]);

        scanner.scan_once().await;
        let report = scanner.scan_once().await;

        assert_eq!(report.notified, 0);
        assert_eq!(report.saved, 1);
        assert_eq!(sent.lock().unwrap().len(), 1);
        assert_eq!(store.get(&drift.key()).await, Some(drift));
    }

    #[tokio::test]
    async fn side_flip_notifies() {
        let long = signal("BTCUSDT", Side::Long, 100.0, 102.0);
        let short = Signal {
            side: Side::Short,
            ..long.clone()
        };
        let gateway = scripted_gateway(vec![Ok(Some(long)), Ok(Some(short))]);
        let (channel, sent) = recording_channel();
        let (scanner, _store) = build_scanner(gateway, channel, &["BTCUSDT"]);

        scanner.scan_once().await;
        let report = scanner.scan_once().await;

        assert_eq!(report.notified, 1);
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].contains("Side: SHORT"));
    }

    #[tokio::test]
    async fn repeated_signal_notifies_only_once() {
        let s = signal("ETHUSDT", Side::Short, 2000.0, 2010.0);
        let gateway = scripted_gateway(vec![Ok(Some(s.clone())), Ok(Some(s.clone()))]);
        let mut channel = MockChannel::new();
        channel.expect_send().times(1).returning(|_| Ok(()));
        let (scanner, store) = build_scanner(gateway, channel, &["ETHUSDT"]);

        scanner.scan_once().await;
        scanner.scan_once().await;

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&s.key()).await, Some(s));
    }

    #[tokio::test]
    async fn tracked_pair_survives_empty_ticks() {
        let s = signal("SOLUSDT", Side::Long, 150.0, 151.0);
        let gateway = scripted_gateway(vec![
            Ok(Some(s.clone())),
            Ok(None),
            Err(GatewayError::Timeout),
            Ok(Some(s.clone())),
        ]);
        let mut channel = MockChannel::new();
        channel.expect_send().times(1).returning(|_| Ok(()));
        let (scanner, store) = build_scanner(gateway, channel, &["SOLUSDT"]);

        for _ in 0..4 {
            scanner.scan_once().await;
        }

        assert_eq!(store.get(&s.key()).await, Some(s));
    }

    #[tokio::test]
    async fn notify_failure_still_saves_and_continues() {
        let btc = signal("BTCUSDT", Side::Long, 100.0, 102.0);
        let eth = signal("ETHUSDT", Side::Short, 50.0, 51.0);
        let gateway = scripted_gateway(vec![Ok(Some(btc.clone())), Ok(Some(eth.clone()))]);

        let mut channel = MockChannel::new();
        channel
            .expect_send()
            .withf(|msg| msg.contains("BTCUSDT"))
            .times(1)
            .returning(|_| Err(NotifyError::Delivery("chat not found".into())));
        channel
            .expect_send()
            .withf(|msg| msg.contains("ETHUSDT"))
            .times(1)
            .returning(|_| Ok(()));
        let (scanner, store) = build_scanner(gateway, channel, &["BTCUSDT", "ETHUSDT"]);

        let report = scanner.scan_once().await;

        assert_eq!(report.notify_failed, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(report.saved, 2);
        assert_eq!(store.get(&btc.key()).await, Some(btc));
        assert_eq!(store.get(&eth.key()).await, Some(eth));
    }

    #[tokio::test]
    async fn pairs_are_requested_in_configured_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let mut gateway = MockGateway::new();
        gateway.expect_analyze().returning(move |req| {
            log.lock().unwrap().push(req.clone());
            Ok(None)
        });
        let channel = MockChannel::new();
        let store = SignalStore::new();
        let scanner = Scanner::new(
            Arc::new(gateway),
            store,
            Arc::new(channel),
            vec!["XRPUSDT".into(), "BTCUSDT".into(), "ZECUSDT".into()],
        )
        .with_timeframe("1h")
        .with_exchange("bybit");

        scanner.scan_once().await;

        let seen = seen.lock().unwrap();
        let symbols: Vec<&str> = seen.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["XRPUSDT", "BTCUSDT", "ZECUSDT"]);
        assert!(seen.iter().all(|r| r.timeframe == "1h" && r.exchange == "bybit"));
    }

    #[tokio::test]
    async fn reply_is_stored_under_requested_key() {
        let mut unlabelled = signal("", Side::Long, 1.0, 2.0);
        unlabelled.timeframe = String::new();
        let gateway = scripted_gateway(vec![Ok(Some(unlabelled))]);
        let (channel, _sent) = recording_channel();
        let (scanner, store) = build_scanner(gateway, channel, &["BNBUSDT"]);

        scanner.scan_once().await;

        let stored = store.get(&SignalKey::new("BNBUSDT", "15m")).await.unwrap();
        assert_eq!(stored.symbol, "BNBUSDT");
        assert_eq!(stored.timeframe, "15m");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_gateway_is_bounded_by_call_timeout() {
        let (channel, sent) = recording_channel();
        let (scanner, store) = build_scanner(HangingGateway, channel, &["BTCUSDT", "ETHUSDT"]);
        let start = time::Instant::now();

        let report = scanner.scan_once().await;

        assert_eq!(report.skipped, 2);
        assert_eq!(start.elapsed(), DEFAULT_CALL_TIMEOUT * 2);
        assert!(sent.lock().unwrap().is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_notifier_is_bounded_and_store_still_updated() {
        let s = signal("BTCUSDT", Side::Long, 100.0, 102.0);
        let gateway = scripted_gateway(vec![Ok(Some(s.clone()))]);
        let (scanner, store) = build_scanner(gateway, HangingChannel, &["BTCUSDT"]);
        let scanner = scanner.with_notify_timeout(Duration::from_secs(3));

        let report = scanner.scan_once().await;

        assert_eq!(report.notify_failed, 1);
        assert_eq!(store.get(&s.key()).await, Some(s));
    }

    #[tokio::test]
    async fn loop_scans_each_tick_until_ticker_closes() {
        let s = signal("BTCUSDT", Side::Long, 100.0, 102.0);
        let gateway = scripted_gateway(vec![
            Ok(Some(s.clone())),
            Ok(Some(s.clone())),
            Ok(Some(Signal {
                side: Side::Short,
                ..s.clone()
            })),
        ]);
        let (channel, sent) = recording_channel();
        let (scanner, store) = build_scanner(gateway, channel, &["BTCUSDT"]);

        let (tx, ticker) = ChannelTicker::new(8);
        for _ in 0..3 {
            tx.send(()).await.unwrap();
        }
        drop(tx);

        let handle = scanner.start(ticker);
        handle.join().await.unwrap();

        assert_eq!(sent.lock().unwrap().len(), 2);
        assert_eq!(store.get(&s.key()).await.unwrap().side, Side::Short);
    }

    #[tokio::test]
    async fn stop_ends_loop_between_ticks() {
        let s = signal("BTCUSDT", Side::Long, 100.0, 102.0);
        let gateway = scripted_gateway(vec![Ok(Some(s.clone()))]);
        let (channel, _sent) = recording_channel();
        let (scanner, store) = build_scanner(gateway, channel, &["BTCUSDT"]);

        let (tx, ticker) = ChannelTicker::new(8);
        let handle = scanner.start(ticker);
        tx.send(()).await.unwrap();

        while store.is_empty().await {
            tokio::task::yield_now().await;
        }
        // Idle between ticks, not exited.
        assert!(!handle.is_finished());
        handle.stop().await.unwrap();

        // The loop is gone; further ticks have nobody to receive them.
        assert!(tx.send(()).await.is_err());
    }
}
