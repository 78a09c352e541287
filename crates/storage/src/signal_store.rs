use common::models::{Signal, SignalKey};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

/// Latest observed signal per (symbol, timeframe).
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct SignalStore {
    inner: Arc<RwLock<HashMap<SignalKey, Signal>>>,
}

impl SignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &SignalKey) -> Option<Signal> {
        let map = self.inner.read().await;
        map.get(key).cloned()
    }

    /// Inserts or replaces the entry keyed by the signal's own symbol and timeframe.
    pub async fn save(&self, signal: Signal) {
        let key = signal.key();
        trace!("Saving signal for {}", key);
        let mut map = self.inner.write().await;
        map.insert(key, signal);
    }

    /// Found entries for `symbol`, in the order of `timeframes`.
    pub async fn get_many(&self, symbol: &str, timeframes: &[&str]) -> Vec<Signal> {
        let map = self.inner.read().await;
        timeframes
            .iter()
            .filter_map(|tf| map.get(&SignalKey::new(symbol, *tf)).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
