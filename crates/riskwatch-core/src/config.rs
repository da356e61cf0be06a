//! Configuration from environment variables and defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_TARGET_RUNS: u32 = 25;
pub const MAX_TARGET_RUNS: u32 = 50;
pub const DEFAULT_BATCH: u32 = 3;
pub const MAX_BATCH: u32 = 10;

pub const DEFAULT_MODEL: &str = "o3";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ESTIMATOR_TIMEOUT_SECS: u64 = 3600;

/// Where the archive, snapshots and intraday samples live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem rooted at `root`.
    Local { root: PathBuf },
    /// Remote blob store reachable over HTTP.
    Remote {
        base_url: String,
        #[serde(skip_serializing)]
        token: Option<String>,
    },
}

/// Settings for the external estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorSettings {
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

/// Top-level Riskwatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskwatchConfig {
    /// Default goal for `ensure`.
    pub target_runs: u32,
    /// Default per-request cap, and the batch size of a tick.
    pub batch: u32,
    pub storage: StorageConfig,
    pub estimator: EstimatorSettings,
}

impl RiskwatchConfig {
    /// Create configuration from the process environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let target_runs = clamped_count(var("DAILY_TARGET_RUNS").as_deref(), MAX_TARGET_RUNS)
            .unwrap_or(DEFAULT_TARGET_RUNS);
        let batch = clamped_count(var("DAILY_BATCH").as_deref(), MAX_BATCH).unwrap_or(DEFAULT_BATCH);

        let blob_base_url = var("BLOB_BASE_URL").filter(|s| !s.trim().is_empty());
        let storage = match var("RISKWATCH_STORAGE").as_deref().map(str::trim) {
            Some("remote") => remote_storage(blob_base_url, &var)?,
            Some("local") => local_storage(&var),
            Some(other) => {
                return Err(Error::Config(format!(
                    "RISKWATCH_STORAGE must be 'local' or 'remote', got '{}'",
                    other
                )))
            }
            None if blob_base_url.is_some() => remote_storage(blob_base_url, &var)?,
            None => local_storage(&var),
        };

        let timeout_secs = var("ESTIMATOR_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_ESTIMATOR_TIMEOUT_SECS);

        let estimator = EstimatorSettings {
            model: var("DR_MODEL")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.into()),
            base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
            api_key: var("OPENAI_API_KEY"),
            timeout_secs,
        };

        Ok(Self {
            target_runs,
            batch,
            storage,
            estimator,
        })
    }
}

fn local_storage(var: &impl Fn(&str) -> Option<String>) -> StorageConfig {
    let root = var("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));
    StorageConfig::Local { root }
}

fn remote_storage(
    base_url: Option<String>,
    var: &impl Fn(&str) -> Option<String>,
) -> Result<StorageConfig> {
    let base_url =
        base_url.ok_or_else(|| Error::Config("remote storage requires BLOB_BASE_URL".into()))?;
    Ok(StorageConfig::Remote {
        base_url,
        token: var("BLOB_READ_WRITE_TOKEN"),
    })
}

/// Parse a caller-supplied run count override, clamped to `1..=50`.
pub fn parse_count_param(input: Option<&str>) -> Option<u32> {
    clamped_count(input, MAX_TARGET_RUNS)
}

/// Parse a caller-supplied batch override, clamped to `1..=10`.
pub fn parse_batch_param(input: Option<&str>) -> Option<u32> {
    clamped_count(input, MAX_BATCH)
}

fn clamped_count(input: Option<&str>, max: u32) -> Option<u32> {
    let n: f64 = input?.trim().parse().ok()?;
    if !n.is_finite() {
        return None;
    }
    Some(n.floor().clamp(1.0, max as f64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RiskwatchConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config.target_runs, 25);
        assert_eq!(config.batch, 3);
        assert_eq!(
            config.storage,
            StorageConfig::Local {
                root: PathBuf::from("data")
            }
        );
        assert_eq!(config.estimator.model, "o3");
        assert_eq!(config.estimator.timeout_secs, 3600);
    }

    #[test]
    fn test_limits_are_clamped() {
        let config = RiskwatchConfig::from_vars(vars(&[
            ("DAILY_TARGET_RUNS", "500"),
            ("DAILY_BATCH", "0"),
        ]))
        .unwrap();
        assert_eq!(config.target_runs, 50);
        assert_eq!(config.batch, 1);
    }

    #[test]
    fn test_garbage_limits_fall_back_to_defaults() {
        let config = RiskwatchConfig::from_vars(vars(&[
            ("DAILY_TARGET_RUNS", "lots"),
            ("DAILY_BATCH", "NaN"),
        ]))
        .unwrap();
        assert_eq!(config.target_runs, 25);
        assert_eq!(config.batch, 3);
    }

    #[test]
    fn test_blob_url_selects_remote() {
        let config = RiskwatchConfig::from_vars(vars(&[
            ("BLOB_BASE_URL", "https://blob.example.com/store"),
            ("BLOB_READ_WRITE_TOKEN", "secret"),
        ]))
        .unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::Remote {
                base_url: "https://blob.example.com/store".into(),
                token: Some("secret".into()),
            }
        );
    }

    #[test]
    fn test_explicit_local_wins_over_blob_url() {
        let config = RiskwatchConfig::from_vars(vars(&[
            ("RISKWATCH_STORAGE", "local"),
            ("BLOB_BASE_URL", "https://blob.example.com"),
            ("DATA_DIR", "/var/lib/riskwatch"),
        ]))
        .unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::Local {
                root: PathBuf::from("/var/lib/riskwatch")
            }
        );
    }

    #[test]
    fn test_remote_without_url_is_config_error() {
        let err = RiskwatchConfig::from_vars(vars(&[("RISKWATCH_STORAGE", "remote")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_param_parsing() {
        assert_eq!(parse_count_param(Some("7.9")), Some(7));
        assert_eq!(parse_count_param(Some("99")), Some(50));
        assert_eq!(parse_batch_param(Some("-3")), Some(1));
        assert_eq!(parse_batch_param(Some("abc")), None);
        assert_eq!(parse_batch_param(None), None);
    }
}
