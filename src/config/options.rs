// src/config/options.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::consts::*;
use crate::error::{Error, Result};

/// Runtime options. Defaults come from `consts`; a TOML file can override any
/// subset (`AppOptions::load`), then CLI flags override that.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppOptions {
    pub crawl: CrawlOptions,
    pub pacing: PacingOptions,
    pub store: StoreOptions,
    pub export: ExportOptions,
}

impl AppOptions {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let opts: AppOptions = toml::from_str(&text)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        self.pacing.validate()?;
        if self.crawl.workers == 0 {
            return Err(Error::Config(s!("crawl.workers must be at least 1")));
        }
        if self.crawl.target_forms.iter().all(|f| f.trim().is_empty()) {
            return Err(Error::Config(s!("crawl.target_forms names no form")));
        }
        if self.crawl.base_url.trim().is_empty() {
            return Err(Error::Config(s!("crawl.base_url is empty")));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CrawlOptions {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Form types accepted in the "Type" column of the filing index (exact,
    /// case-insensitive). Add "4/A" to take amendments too.
    pub target_forms: Vec<String>,
    pub throttle_cooldown_secs: u64,
    pub max_throttle_retries: u32,
    pub network_retries: u32,
    pub backoff_base_ms: u64,
    pub workers: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            base_url: s!(BASE_URL),
            timeout_secs: REQUEST_TIMEOUT_SECS,
            target_forms: TARGET_FORMS.iter().map(|f| s!(*f)).collect(),
            throttle_cooldown_secs: THROTTLE_COOLDOWN_SECS,
            max_throttle_retries: MAX_THROTTLE_RETRIES,
            network_retries: NETWORK_RETRIES,
            backoff_base_ms: BACKOFF_BASE_MS,
            workers: WORKERS,
        }
    }
}

impl CrawlOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> crate::core::retry::RetryPolicy {
        crate::core::retry::RetryPolicy {
            cooldown: Duration::from_secs(self.throttle_cooldown_secs),
            max_throttles: self.max_throttle_retries,
            network_retries: self.network_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PacingOptions {
    /// Window variance (s²) above which the delay grows by one second.
    pub variance_upper: f64,
    /// Window variance (s²) below which a non-zero delay shrinks by one second.
    pub variance_lower: f64,
    pub window: usize,
}

impl Default for PacingOptions {
    fn default() -> Self {
        Self {
            variance_upper: VARIANCE_UPPER,
            variance_lower: VARIANCE_LOWER,
            window: PACING_WINDOW,
        }
    }
}

impl PacingOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.variance_lower >= 0.0 && self.variance_upper >= 0.0) {
            return Err(Error::Config(s!("pacing thresholds must be non-negative numbers")));
        }
        if self.variance_lower > self.variance_upper {
            return Err(Error::Config(format!(
                "pacing.variance_lower ({}) exceeds pacing.variance_upper ({})",
                self.variance_lower, self.variance_upper
            )));
        }
        if self.window < 2 {
            return Err(Error::Config(s!("pacing.window must hold at least 2 durations")));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    pub root: PathBuf,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { root: PathBuf::from(STORE_DIR) }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Directory for `data_{cik}.csv` dumps; `None` disables export.
    pub out_dir: Option<PathBuf>,
    pub sep: char,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { out_dir: None, sep: EXPORT_SEP }
    }
}

impl ExportOptions {
    pub fn out_path(&self, issuer: &str) -> Option<PathBuf> {
        self.out_dir
            .as_ref()
            .map(|dir| dir.join(format!("data_{issuer}.csv")))
    }
}
