//! Riskwatch Core: data model, error taxonomy, configuration, UTC dates.

pub mod config;
pub mod date;
pub mod error;
pub mod types;

pub use config::{RiskwatchConfig, StorageConfig};
pub use error::{Error, Result};
pub use types::{Citation, DailySnapshot, IntradaySample, Run};
