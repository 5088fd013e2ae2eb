// src/error.rs
use std::path::PathBuf;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid issuer id: '{0}'")]
    InvalidIssuer(String),

    #[error("Invalid date window: {0}")]
    InvalidWindow(String),

    #[error("Config error: {0}")]
    Config(String),

    /// Transport-level failure (timeout, reset, DNS). Retryable.
    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Still throttled after {attempts} cooldowns: {url}")]
    ThrottleLimit { url: String, attempts: u32 },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Storage error at {}: {reason}", path.display())]
    Storage { path: PathBuf, reason: String },

    #[error("Record for issuer '{found}' cannot be merged into partition '{expected}'")]
    PartitionMismatch { expected: String, found: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Config file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub fn storage(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Storage { path: path.into(), reason: reason.into() }
    }

    /// Worth another attempt under the network backoff policy.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network { .. } => true,
            Error::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
