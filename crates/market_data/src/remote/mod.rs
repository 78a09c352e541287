pub mod analyze_response;
pub mod smc_client;

pub use analyze_response::AnalyzeResponse;
pub use smc_client::SmcClient;
