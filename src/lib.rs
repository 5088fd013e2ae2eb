// src/lib.rs

#[macro_use]
pub mod macros;

pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod model;
pub mod specs;

pub mod enrich;
pub mod file;
pub mod csv;
pub mod merge;
pub mod pacing;
pub mod progress;
pub mod runner;
pub mod scrape;
pub mod store;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};
