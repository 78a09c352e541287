pub mod signal_store;

pub use signal_store::SignalStore;
