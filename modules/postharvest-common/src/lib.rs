pub mod config;
pub mod error;
pub mod traits;
pub mod types;
pub mod util;

pub use config::AppConfig;
pub use error::PostHarvestError;
pub use traits::PostAnalyzer;
pub use types::*;
pub use util::*;
