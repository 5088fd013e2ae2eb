// src/log.rs
//
// Subscriber setup for the logf!/logd!/logw!/loge! macros (see macros.rs).
// Library code only emits events; the binary decides where they go.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::Result;

const DEFAULT_FILTER: &str = "info";

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over `default_level`. With `log_file` set, lines are appended to
/// that file (parent directories created) instead of stderr.
pub fn init(default_level: Option<&str>, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.unwrap_or(DEFAULT_FILTER)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    // try_init: a subscriber may already be installed (tests)
    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
    Ok(())
}
