//! Ingestion configuration
//!
//! Fetch timeouts, scratch location, and run concurrency, loaded from the
//! environment (a `.env` file is honoured) with documented defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default whole-request timeout for artifact downloads
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;

/// Default TCP connect timeout for artifact downloads
pub const DEFAULT_FETCH_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default number of references reconciled in parallel
pub const DEFAULT_MAX_CONCURRENT_RUNS: usize = 4;

/// Default deadline for a single pipeline run
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 600;

/// HTTP settings for the artifact fetcher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_FETCH_CONNECT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timeout_secs == 0 {
            anyhow::bail!("SIFT_FETCH_TIMEOUT_SECS must be greater than 0");
        }
        if self.connect_timeout_secs == 0 {
            anyhow::bail!("SIFT_FETCH_CONNECT_TIMEOUT_SECS must be greater than 0");
        }
        if self.connect_timeout_secs > self.timeout_secs {
            anyhow::bail!(
                "SIFT_FETCH_CONNECT_TIMEOUT_SECS ({}) cannot exceed SIFT_FETCH_TIMEOUT_SECS ({})",
                self.connect_timeout_secs,
                self.timeout_secs
            );
        }
        if self.user_agent.trim().is_empty() {
            anyhow::bail!("SIFT_USER_AGENT cannot be empty");
        }
        Ok(())
    }
}

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    pub fetch: FetchConfig,

    /// Parent directory of per-run scratch areas
    pub scratch_dir: PathBuf,

    /// Number of distinct references reconciled in parallel
    pub max_concurrent_runs: usize,

    /// Deadline for one run, after which it is cancelled
    pub run_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            scratch_dir: std::env::temp_dir(),
            max_concurrent_runs: DEFAULT_MAX_CONCURRENT_RUNS,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
        }
    }
}

impl IngestConfig {
    /// Load ingestion configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            fetch: FetchConfig {
                timeout_secs: env_parse("SIFT_FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)?,
                connect_timeout_secs: env_parse(
                    "SIFT_FETCH_CONNECT_TIMEOUT_SECS",
                    DEFAULT_FETCH_CONNECT_TIMEOUT_SECS,
                )?,
                user_agent: std::env::var("SIFT_USER_AGENT")
                    .unwrap_or_else(|_| default_user_agent()),
            },
            scratch_dir: std::env::var("SIFT_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            max_concurrent_runs: env_parse(
                "SIFT_MAX_CONCURRENT_RUNS",
                DEFAULT_MAX_CONCURRENT_RUNS,
            )?,
            run_timeout_secs: env_parse("SIFT_RUN_TIMEOUT_SECS", DEFAULT_RUN_TIMEOUT_SECS)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.fetch.validate()?;
        if self.max_concurrent_runs == 0 {
            anyhow::bail!("SIFT_MAX_CONCURRENT_RUNS must be greater than 0");
        }
        if self.run_timeout_secs == 0 {
            anyhow::bail!("SIFT_RUN_TIMEOUT_SECS must be greater than 0");
        }
        Ok(())
    }

    /// Get run timeout as Duration
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

fn default_user_agent() -> String {
    format!("sift/{}", env!("CARGO_PKG_VERSION"))
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}='{}': {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}
