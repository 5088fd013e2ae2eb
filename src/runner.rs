// src/runner.rs
//
// One issuer run:  seen (store) → discover − seen → fetch → enrich → merge → export
// A batch fans issuers out over a small worker pool; one worker owns one issuer
// (and so one partition) at a time.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use crate::{
    config::AppOptions,
    core::{Cancel, Fetch, RequestStats, Requester, Sleeper, ThreadSleeper},
    enrich::{Enricher, NoPrices, PriceJoinEnricher},
    error::{Error, Result},
    file::export_dataset,
    merge::{merge_batch, MergeOutcome},
    model::{DateWindow, FilingId, IssuerId},
    pacing::RateController,
    progress::{LogProgress, Progress},
    scrape::{discover, fetch_filings, Target},
    specs::form4::{DocumentParser, Form4Parser},
    store::PartitionStore,
};

/// What one issuer run did.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuerReport {
    pub issuer: IssuerId,
    pub discovered: usize,
    pub already_stored: usize,
    pub fetched_records: usize,
    pub merge: MergeOutcome,
    pub export: Option<PathBuf>,
    pub requests: RequestStats,
    pub final_delay_secs: u64,
}

/// Summary of a batch. Failed issuers never abort the others.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<IssuerReport>,
    pub failed: Vec<(IssuerId, Error)>,
}

impl RunSummary {
    pub fn appended(&self) -> usize {
        self.reports.iter().map(|r| r.merge.appended).sum()
    }
}

/// Crawl engine with its collaborators. Shared read-only by the workers.
pub struct Runner {
    opts: AppOptions,
    store: PartitionStore,
    fetch: Box<dyn Fetch>,
    sleeper: Box<dyn Sleeper>,
    parser: Box<dyn DocumentParser>,
    enricher: Box<dyn Enricher>,
    cancel: Cancel,
}

impl Runner {
    /// Real sleeps, Form 4 parsing, no market data.
    pub fn new(opts: AppOptions, fetch: impl Fetch + 'static) -> Self {
        let store = PartitionStore::new(opts.store.root.clone());
        Self {
            opts,
            store,
            fetch: Box::new(fetch),
            sleeper: Box::new(ThreadSleeper),
            parser: Box::new(Form4Parser),
            enricher: Box::new(PriceJoinEnricher::new(NoPrices)),
            cancel: Cancel::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn with_parser(mut self, parser: impl DocumentParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn with_enricher(mut self, enricher: impl Enricher + 'static) -> Self {
        self.enricher = Box::new(enricher);
        self
    }

    pub fn with_cancel(mut self, cancel: Cancel) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn store(&self) -> &PartitionStore { &self.store }

    pub fn cancel_token(&self) -> Cancel { self.cancel.clone() }

    pub fn run_issuer(
        &self,
        issuer: &IssuerId,
        window: Option<&DateWindow>,
        progress: Option<&mut dyn Progress>,
    ) -> Result<IssuerReport> {
        let span = tracing::info_span!("issuer", cik = %issuer);
        let _enter = span.enter();

        let req = Requester::new(
            self.fetch.as_ref(),
            self.sleeper.as_ref(),
            &self.cancel,
            self.opts.crawl.retry_policy(),
        );
        let mut pacer = RateController::new(&self.opts.pacing)?;
        let target = Target {
            base: &self.opts.crawl.base_url,
            issuer,
            forms: &self.opts.crawl.target_forms,
        };

        let seen = self.store.seen_filings(issuer)?;
        let discovered = discover(&req, &target, window)?;
        let todo: BTreeSet<FilingId> = discovered.difference(&seen).cloned().collect();
        logf!(
            "CIK: '{issuer}'| {} to fetch, {} already stored",
            todo.len(),
            discovered.len() - todo.len()
        );

        let records = fetch_filings(&req, &mut pacer, self.parser.as_ref(), &target, &todo, progress)?;
        let fetched_records = records.len();
        let enriched = self.enricher.enrich(records)?;
        let merge = merge_batch(&self.store, issuer, enriched, window)?;

        let export = match self.opts.export.out_path(issuer.as_str()) {
            Some(path) if export_dataset(&path, &merge.dataset, self.opts.export.sep)? => Some(path),
            _ => None,
        };

        let requests = req.stats();
        logf!(
            "CIK: '{issuer}'| done: {} appended, {} requests, {} throttled",
            merge.appended,
            requests.requests,
            requests.throttles
        );
        Ok(IssuerReport {
            issuer: issuer.clone(),
            discovered: discovered.len(),
            already_stored: discovered.len() - todo.len(),
            fetched_records,
            merge,
            export,
            requests,
            final_delay_secs: pacer.delay_secs(),
        })
    }

    /// Run every issuer (duplicates collapsed) on up to `crawl.workers` threads.
    pub fn run_batch(
        &self,
        issuers: &[IssuerId],
        window: Option<&DateWindow>,
        mut progress: Option<&mut dyn Progress>,
    ) -> RunSummary {
        let ids: Vec<IssuerId> = issuers.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let total = ids.len();
        let mut summary = RunSummary::default();
        if total == 0 {
            return summary;
        }
        if let Some(p) = progress.as_deref_mut() {
            p.begin(total);
        }

        let workers = self.opts.crawl.workers.min(total).max(1);
        let counter = AtomicUsize::new(0);
        let (res_tx, res_rx) = mpsc::channel::<(IssuerId, Result<IssuerReport>)>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = res_tx.clone();
                let ids = &ids;
                let counter = &counter;
                scope.spawn(move || loop {
                    let i = counter.fetch_add(1, Ordering::Relaxed);
                    if i >= ids.len() {
                        break;
                    }
                    let issuer = &ids[i];
                    let mut issuer_progress = LogProgress::new(format!("CIK: '{issuer}'"));
                    let result = self.run_issuer(issuer, window, Some(&mut issuer_progress as &mut dyn Progress));
                    if tx.send((issuer.clone(), result)).is_err() {
                        break;
                    }
                });
            }
            drop(res_tx); // workers hold the only senders now

            for (done, (issuer, result)) in res_rx.iter().enumerate() {
                match result {
                    Ok(report) => summary.reports.push(report),
                    Err(e) => {
                        match progress.as_deref_mut() {
                            Some(p) => p.item_failed(&format!("CIK: '{issuer}'"), &e.to_string()),
                            None => loge!("CIK: '{issuer}'| {e}"),
                        }
                        summary.failed.push((issuer, e));
                    }
                }
                if let Some(p) = progress.as_deref_mut() {
                    p.item_done(done + 1, total);
                }
            }
        });

        summary.reports.sort_by(|a, b| a.issuer.cmp(&b.issuer));
        summary.failed.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(p) = progress.as_deref_mut() {
            p.finish();
        }
        summary
    }
}
