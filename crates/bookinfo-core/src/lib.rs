pub mod config;
pub mod error;
pub mod models;
pub mod naming;

pub use config::{AppConfig, ExtractionConfig, LookupConfig, RetryConfig};
pub use error::{CoreError, Result};
pub use models::*;
