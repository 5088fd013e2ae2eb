// src/scrape.rs
//
// Crawl side of one issuer run: list filings, then walk each remaining filing
// through folder → index → Form 4 documents. Every GET goes through the
// `Requester` (throttle/backoff); every cycle is timed and fed to the pacer.

use std::collections::BTreeSet;
use std::time::Instant;

use crate::{
    core::retry::Requester,
    error::{Error, Result},
    model::{DateWindow, FilingId, IssuerId, TransactionRecord},
    pacing::RateController,
    progress::Progress,
    specs::{filing, form4::DocumentParser, listing},
};

/// Where and what to fetch for one issuer.
#[derive(Clone, Debug)]
pub struct Target<'a> {
    pub base: &'a str,
    pub issuer: &'a IssuerId,
    /// Accepted document types.
    pub forms: &'a [String],
}

impl Target<'_> {
    pub fn listing_url(&self) -> String {
        format!("{}{}{}/", self.base, crate::config::consts::ARCHIVE_PATH, self.issuer)
    }
}

/// Filing ids in the issuer's directory listing, restricted to `window` when given.
pub fn discover(req: &Requester, target: &Target, window: Option<&DateWindow>) -> Result<BTreeSet<FilingId>> {
    let url = target.listing_url();
    let doc = req.get(&url)?;
    let rows = listing::parse(&doc, target.issuer);
    let ids = listing::select(&rows, window);
    logf!("CIK: '{}'| {} filings listed, {} in window", target.issuer, rows.len(), ids.len());
    Ok(ids)
}

/// One fetch cycle: folder listing → index page → every matching document.
fn fetch_one(
    req: &Requester,
    target: &Target,
    parser: &dyn DocumentParser,
    id: &FilingId,
) -> Result<Vec<TransactionRecord>> {
    let folder = req.get(&filing::folder_url(target.base, target.issuer, id))?;
    let Some(index_href) = filing::index_link(&folder, target.issuer, id) else {
        logd!("CIK: '{}'| {id}: no index link", target.issuer);
        return Ok(Vec::new());
    };

    let index = req.get(&filing::absolute(target.base, &index_href))?;
    let docs = filing::document_links(&index, target.base, target.issuer, id, target.forms);

    let mut out = Vec::new();
    for url in docs {
        let body = req.get(&url)?;
        out.extend(parser.parse(&body, target.issuer, &url));
    }
    Ok(out)
}

/// Fetch every id in order. The rate controller sets the pause between cycles.
///
/// A filing whose requests fail after their retry budget is logged and skipped;
/// throttle ceiling and cancellation end the run.
pub fn fetch_filings(
    req: &Requester,
    pacer: &mut RateController,
    parser: &dyn DocumentParser,
    target: &Target,
    ids: &BTreeSet<FilingId>,
    mut progress: Option<&mut dyn Progress>,
) -> Result<Vec<TransactionRecord>> {
    let total = ids.len();
    if let Some(p) = progress.as_deref_mut() {
        p.begin(total);
    }

    let mut records = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        req.cancel().check()?;

        let started = Instant::now();
        let cooled_before = req.stats().cooldown;
        match fetch_one(req, target, parser, id) {
            Ok(mut recs) => records.append(&mut recs),
            Err(e @ (Error::ThrottleLimit { .. } | Error::Cancelled)) => {
                if let Some(p) = progress.as_deref_mut() {
                    p.finish();
                }
                return Err(e);
            }
            Err(e) => {
                loge!("CIK: '{}'| {id}: {e}", target.issuer);
                if let Some(p) = progress.as_deref_mut() {
                    p.item_failed(id.as_str(), &e.to_string());
                }
            }
        }

        // cooldowns are not latency
        let elapsed = started.elapsed();
        let cooled = req.stats().cooldown.saturating_sub(cooled_before);
        pacer.observe(elapsed.saturating_sub(cooled));

        if let Some(p) = progress.as_deref_mut() {
            p.item_done(i + 1, total);
        }
        if i + 1 < total {
            req.sleeper().sleep(pacer.current_delay(), req.cancel())?;
        }
    }

    if let Some(p) = progress.as_deref_mut() {
        p.finish();
    }
    Ok(records)
}
