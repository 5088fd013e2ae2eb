// src/merge.rs
//
// Content-addressed merge of one issuer's batch into its partition.
//
// A row's identity is the SHA-256 of its canonical field text (COLUMNS order,
// joined by \x1f). The same values hash the same in every run and process, so
// re-running a crawl over already-merged filings appends nothing.

use std::collections::HashSet;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::model::{DateWindow, EnrichedRecord, IssuerId};
use crate::store::{PartitionStore, StoredRow};

/// Persisted column order. Part files carry these columns plus `hash`.
pub const COLUMNS: [&str; 32] = [
    "cik",
    "parent_cik",
    "name",
    "ticker",
    "rpt_owner_name",
    "rpt_owner_cik",
    "is_director",
    "is_officer",
    "is_ten_percent_owner",
    "is_other",
    "officer_title",
    "security_title",
    "transaction_date",
    "form_type",
    "code",
    "equity_swap",
    "shares",
    "acquired_disposed_code",
    "shares_owned_following_transaction",
    "direct_or_indirect_ownership",
    "form4_link",
    "open",
    "high",
    "low",
    "close",
    "adj_close",
    "volume",
    "daily_return",
    "percent_change",
    "range",
    "average_price",
    "shares_value_usd",
];

pub const HASH_COLUMN: &str = "hash";

const UNIT_SEP: char = '\x1f';

/* ---------------- Canonical text ---------------- */

fn num(v: f64) -> String {
    if !v.is_finite() {
        return s!();
    }
    // -0 and 0 are the same value
    if v == 0.0 { s!("0") } else { format!("{v}") }
}

fn opt_num(v: Option<f64>) -> String {
    v.map(num).unwrap_or_default()
}

fn flag(b: bool) -> String {
    s!(if b { "true" } else { "false" })
}

fn day(d: Option<NaiveDate>) -> String {
    d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

/// Field values in `COLUMNS` order, canonical text form.
pub fn to_fields(r: &EnrichedRecord) -> Vec<String> {
    let t = &r.tx;
    vec![
        t.cik.clone(),
        s!(t.parent_cik.as_str()),
        t.name.clone(),
        t.ticker.clone(),
        t.rpt_owner_name.clone(),
        t.rpt_owner_cik.clone(),
        flag(t.is_director),
        flag(t.is_officer),
        flag(t.is_ten_percent_owner),
        flag(t.is_other),
        t.officer_title.clone(),
        t.security_title.clone(),
        day(t.transaction_date),
        t.form_type.clone(),
        t.code.clone(),
        flag(t.equity_swap),
        num(t.shares),
        t.acquired_disposed_code.clone(),
        num(t.shares_owned_following_transaction),
        t.direct_or_indirect_ownership.clone(),
        t.form4_link.clone(),
        opt_num(r.open),
        opt_num(r.high),
        opt_num(r.low),
        opt_num(r.close),
        opt_num(r.adj_close),
        opt_num(r.volume),
        opt_num(r.daily_return),
        opt_num(r.percent_change),
        opt_num(r.range),
        opt_num(r.average_price),
        opt_num(r.shares_value_usd),
    ]
}

/// Lowercase hex SHA-256 of the canonical fields.
pub fn hash_fields(fields: &[String]) -> String {
    let mut hasher = Sha256::new();
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            let mut buf = [0u8; 4];
            hasher.update(UNIT_SEP.encode_utf8(&mut buf).as_bytes());
        }
        hasher.update(f.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub fn record_hash(r: &EnrichedRecord) -> String {
    hash_fields(&to_fields(r))
}

/* ---------------- Merge ---------------- */

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MergeOutcome {
    pub appended: usize,
    pub skipped_duplicate_incoming: usize,
    pub skipped_existing: usize,
    pub skipped_incomplete: usize,
    /// Existing partition rows (window-restricted when given) followed by appended rows.
    pub dataset: Vec<EnrichedRecord>,
}

/// Key fields present and share counts finite.
fn is_complete(r: &EnrichedRecord) -> bool {
    !r.tx.parent_cik.is_empty()
        && !r.tx.form4_link.is_empty()
        && r.tx.transaction_date.is_some()
        && r.tx.shares.is_finite()
        && r.tx.shares_owned_following_transaction.is_finite()
}

/// Merge `batch` into `issuer`'s partition; only rows whose hash is new are written.
///
/// Nothing is written when the partition cannot be read, when a record belongs to
/// another issuer, or when no row survives.
pub fn merge_batch(
    store: &PartitionStore,
    issuer: &IssuerId,
    batch: Vec<EnrichedRecord>,
    window: Option<&DateWindow>,
) -> Result<MergeOutcome> {
    if let Some(foreign) = batch.iter().find(|r| !r.issuer().is_empty() && r.issuer() != issuer) {
        return Err(Error::PartitionMismatch {
            expected: issuer.to_string(),
            found: foreign.issuer().to_string(),
        });
    }

    let existing: Vec<StoredRow> = store.read_partition(issuer)?;
    let committed: HashSet<&str> = existing.iter().map(|r| r.hash.as_str()).collect();

    let mut out = MergeOutcome::default();
    let mut seen_incoming: HashSet<String> = HashSet::new();
    let mut fresh: Vec<(String, EnrichedRecord)> = Vec::new();

    for rec in batch {
        let h = record_hash(&rec);
        if !seen_incoming.insert(h.clone()) {
            out.skipped_duplicate_incoming += 1;
        } else if committed.contains(h.as_str()) {
            out.skipped_existing += 1;
        } else if !is_complete(&rec) {
            out.skipped_incomplete += 1;
        } else {
            fresh.push((h, rec));
        }
    }

    if !fresh.is_empty() {
        let path = store.append(issuer, &fresh)?;
        logf!("CIK: '{issuer}'| appended {} rows to {}", fresh.len(), path.display());
    } else {
        logf!("CIK: '{issuer}'| nothing new to append");
    }
    out.appended = fresh.len();

    out.dataset = existing
        .into_iter()
        .map(|r| r.record)
        .filter(|r| match (window, r.tx.transaction_date) {
            (None, _) => true,
            (Some(w), Some(d)) => w.contains(d),
            (Some(_), None) => false,
        })
        .chain(fresh.into_iter().map(|(_, r)| r))
        .collect();

    logd!(
        "CIK: '{issuer}'| merge: +{} dup_in={} existing={} incomplete={} dataset={}",
        out.appended,
        out.skipped_duplicate_incoming,
        out.skipped_existing,
        out.skipped_incomplete,
        out.dataset.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransactionRecord;

    fn sample(link: &str, shares: f64) -> EnrichedRecord {
        EnrichedRecord::from_transaction(TransactionRecord {
            cik: s!("0000320193"),
            parent_cik: IssuerId::parse("320193").unwrap(),
            name: s!("Apple Inc."),
            ticker: s!("AAPL"),
            security_title: s!("Restricted Stock Unit"),
            transaction_date: NaiveDate::from_ymd_opt(2021, 4, 1),
            code: s!("M"),
            shares,
            form4_link: s!(link),
            ..TransactionRecord::default()
        })
    }

    #[test]
    fn hash_is_stable_and_hex() {
        let a = sample("https://x/1/a.xml", 10.0);
        let h = record_hash(&a);
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(h, record_hash(&a.clone()));
        assert_ne!(h, record_hash(&sample("https://x/1/a.xml", 11.0)));
    }

    #[test]
    fn separator_prevents_field_bleed() {
        let a = hash_fields(&[s!("ab"), s!("c")]);
        let b = hash_fields(&[s!("a"), s!("bc")]);
        assert_ne!(a, b);
    }

    #[test]
    fn negative_zero_is_zero() {
        assert_eq!(num(-0.0), "0");
        assert_eq!(num(1250.0), "1250");
        assert_eq!(num(0.1234), "0.1234");
        assert_eq!(num(f64::NAN), "");
    }

    #[test]
    fn foreign_issuer_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let issuer = IssuerId::parse("320193").unwrap();
        let mut other = sample("https://x/2/b.xml", 1.0);
        other.tx.parent_cik = IssuerId::parse("789019").unwrap();

        let err = merge_batch(&store, &issuer, vec![sample("https://x/1/a.xml", 1.0), other], None).unwrap_err();
        assert!(matches!(err, Error::PartitionMismatch { .. }));
        assert!(!store.partition_dir(&issuer).exists());
    }

    #[test]
    fn dedups_incoming_existing_and_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let issuer = IssuerId::parse("320193").unwrap();

        let a = sample("https://x/1/a.xml", 1.0);
        let b = sample("https://x/1/a.xml", 2.0);
        let mut undated = sample("https://x/1/a.xml", 3.0);
        undated.tx.transaction_date = None;

        let first = merge_batch(&store, &issuer, vec![a.clone(), a.clone(), undated], None).unwrap();
        assert_eq!(first.appended, 1);
        assert_eq!(first.skipped_duplicate_incoming, 1);
        assert_eq!(first.skipped_incomplete, 1);

        let second = merge_batch(&store, &issuer, vec![a.clone(), b.clone()], None).unwrap();
        assert_eq!(second.appended, 1);
        assert_eq!(second.skipped_existing, 1);
        assert_eq!(second.dataset, vec![a, b]);
    }

    #[test]
    fn non_finite_shares_are_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let issuer = IssuerId::parse("320193").unwrap();
        let mut owned = sample("https://x/1/b.xml", 1.0);
        owned.tx.shares_owned_following_transaction = f64::INFINITY;

        let out = merge_batch(&store, &issuer, vec![sample("https://x/1/a.xml", f64::NAN), owned], None).unwrap();
        assert_eq!(out.appended, 0);
        assert_eq!(out.skipped_incomplete, 2);

        let ok = merge_batch(&store, &issuer, vec![sample("https://x/1/c.xml", 5.0)], None).unwrap();
        assert_eq!(ok.appended, 1);
        assert_eq!(store.read_partition(&issuer).unwrap().len(), 1);
    }

    #[test]
    fn idempotent_rerun_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let issuer = IssuerId::parse("320193").unwrap();
        let batch = vec![sample("https://x/1/a.xml", 1.0), sample("https://x/2/b.xml", 1.0)];

        merge_batch(&store, &issuer, batch.clone(), None).unwrap();
        let parts = store.part_files(&issuer).unwrap().len();
        let again = merge_batch(&store, &issuer, batch, None).unwrap();
        assert_eq!(again.appended, 0);
        assert_eq!(again.skipped_existing, 2);
        assert_eq!(store.part_files(&issuer).unwrap().len(), parts);
    }

    #[test]
    fn merging_one_issuer_leaves_another_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let apple = IssuerId::parse("320193").unwrap();
        let msft = IssuerId::parse("789019").unwrap();
        let mut m = sample("https://x/789019/1/m.xml", 1.0);
        m.tx.parent_cik = msft.clone();
        merge_batch(&store, &msft, vec![m], None).unwrap();
        let before = store.read_partition(&msft).unwrap();

        merge_batch(&store, &apple, vec![sample("https://x/1/a.xml", 1.0), sample("https://x/2/b.xml", 2.0)], None)
            .unwrap();
        assert_eq!(store.read_partition(&msft).unwrap(), before);
        assert_eq!(store.part_files(&msft).unwrap().len(), 1);
    }

    #[test]
    fn dataset_respects_window_for_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let issuer = IssuerId::parse("320193").unwrap();
        let mut old = sample("https://x/1/a.xml", 1.0);
        old.tx.transaction_date = NaiveDate::from_ymd_opt(2005, 1, 1);
        merge_batch(&store, &issuer, vec![old], None).unwrap();

        let w = DateWindow::parse("2012-01-01", "2022-12-31").unwrap();
        let out = merge_batch(&store, &issuer, vec![sample("https://x/2/b.xml", 1.0)], Some(&w)).unwrap();
        assert_eq!(out.dataset.len(), 1);
        assert_eq!(out.dataset[0].tx.form4_link, "https://x/2/b.xml");
    }
}
