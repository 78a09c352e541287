use std::time::Duration;

use async_trait::async_trait;
use tokio::{
    sync::mpsc,
    time::{self, Interval, MissedTickBehavior},
};

/// Source of scan ticks.
#[async_trait]
pub trait Ticker: Send {
    /// Waits for the next tick. `false` means no more ticks will arrive.
    async fn tick(&mut self) -> bool;
}

/// Fixed-period ticker. The first tick fires immediately; a tick that
/// overruns the period delays the following one instead of bursting.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticks on every message received; ends when all senders are dropped.
pub struct ChannelTicker {
    rx: mpsc::Receiver<()>,
}

impl ChannelTicker {
    pub fn new(buffer: usize) -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

#[async_trait]
impl Ticker for ChannelTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}
