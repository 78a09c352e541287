pub mod signal;

pub use signal::{ParseSideError, Side, Signal, SignalKey};
