// src/cli.rs
use std::path::PathBuf;

use clap::Parser;

use crate::config::consts::DEFAULT_OUT_DIR;
use crate::config::AppOptions;
use crate::core::HttpFetcher;
use crate::error::{Error, Result};
use crate::model::{DateWindow, IssuerId};
use crate::progress::LogProgress;
use crate::runner::{RunSummary, Runner};

/// Incremental SEC Form 4 harvester.
#[derive(Debug, Parser)]
#[command(name = "form4_scrape", version, about)]
pub struct Args {
    /// Issuer CIK; repeat or comma-separate for several.
    #[arg(long = "cik", required = true, value_delimiter = ',')]
    pub ciks: Vec<String>,

    /// First listing day to include (YYYY-MM-DD).
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// Last listing day to include (YYYY-MM-DD).
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Concurrent issuers.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Partitioned store root.
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Directory for pipe-separated `data_{cik}.csv` exports (bare flag: `form4-10yrs`).
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_OUT_DIR)]
    pub export: Option<PathBuf>,

    /// TOML options file; flags override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Append log lines to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset (e.g. `debug`).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    /// Config file (or defaults) with flag overrides applied, validated.
    pub fn options(&self) -> Result<AppOptions> {
        let mut opts = match &self.config {
            Some(path) => AppOptions::load(path)?,
            None => AppOptions::default(),
        };
        if let Some(w) = self.workers {
            opts.crawl.workers = w;
        }
        if let Some(root) = &self.store {
            opts.store.root = root.clone();
        }
        if let Some(dir) = &self.export {
            opts.export.out_dir = Some(dir.clone());
        }
        opts.validate()?;
        Ok(opts)
    }

    pub fn issuers(&self) -> Result<Vec<IssuerId>> {
        self.ciks
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| IssuerId::parse(c))
            .collect()
    }

    pub fn window(&self) -> Result<Option<DateWindow>> {
        match (&self.start, &self.end) {
            (Some(s), Some(e)) => DateWindow::parse(s, e).map(Some),
            (None, None) => Ok(None),
            _ => Err(Error::InvalidWindow(s!("--start and --end go together"))),
        }
    }
}

/// Parse flags, set up logging, run the batch.
pub fn run() -> Result<RunSummary> {
    run_with(Args::parse())
}

pub fn run_with(args: Args) -> Result<RunSummary> {
    crate::log::init(args.log_level.as_deref(), args.log_file.as_deref())?;

    let opts = args.options()?;
    let issuers = args.issuers()?;
    let window = args.window()?;

    logf!(
        "{} issuer(s), window {}, {} worker(s), store {}",
        issuers.len(),
        window.map_or_else(|| s!("none"), |w| format!("{}..{}", w.start, w.end)),
        opts.crawl.workers,
        opts.store.root.display()
    );

    let fetcher = HttpFetcher::new(&opts.crawl)?;
    let runner = Runner::new(opts, fetcher);
    let mut progress = LogProgress::new("batch");
    let summary = runner.run_batch(&issuers, window.as_ref(), Some(&mut progress));

    logf!(
        "finished: {} issuer(s) ok, {} failed, {} rows appended",
        summary.reports.len(),
        summary.failed.len(),
        summary.appended()
    );
    Ok(summary)
}
