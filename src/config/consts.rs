// src/config/consts.rs

// Net config
pub const BASE_URL: &str = "https://www.sec.gov";
pub const ARCHIVE_PATH: &str = "/Archives/edgar/data/";
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

// Browser-like header set; EDGAR blocks bare clients
pub const HDR_CONNECTION: &str = "close";
pub const HDR_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";
pub const HDR_X_REQUESTED_WITH: &str = "XMLHttpRequest";
pub const HDR_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/80.0.3987.163 Safari/537.36";

// Throttling
pub const RATE_LIMIT_MARKER: &str = "SEC.gov | Request Rate Threshold Exceeded";
pub const THROTTLE_COOLDOWN_SECS: u64 = 60;
pub const MAX_THROTTLE_RETRIES: u32 = 30;
pub const NETWORK_RETRIES: u32 = 3;
pub const BACKOFF_BASE_MS: u64 = 2_000;

// Pacing
pub const VARIANCE_UPPER: f64 = 0.5;
pub const VARIANCE_LOWER: f64 = 0.4;
pub const PACING_WINDOW: usize = 3;

// Scrape
pub const TARGET_FORMS: &[&str] = &["4"];
pub const INDEX_SUFFIX: &str = "-index.html";
pub const DOCUMENT_EXT: &str = ".xml";

// Store
pub const STORE_DIR: &str = "system/trading-data";
pub const PARTITION_KEY: &str = "parent_cik";

// Export
pub const DEFAULT_OUT_DIR: &str = "form4-10yrs";
pub const EXPORT_SEP: char = '|';

// Concurrency
pub const WORKERS: usize = 2;
