pub mod change_detection;
pub mod formatter;
pub mod services;
pub mod ticker;

pub use services::scanner_service::{ScanReport, Scanner, ScannerHandle};
pub use ticker::{ChannelTicker, IntervalTicker, Ticker};
