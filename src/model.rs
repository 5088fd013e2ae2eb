// src/model.rs
//
// Fixed-schema records flowing through a crawl run:
//   listing → FilingId → Form 4 XML → TransactionRecord → EnrichedRecord → partition row

use std::fmt;

use chrono::NaiveDate;

use crate::error::{Error, Result};

/// Issuer CIK with leading zeros stripped (`"0000320193"` → `"320193"`).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IssuerId(String);

impl IssuerId {
    pub fn parse(raw: &str) -> Result<Self> {
        let t = raw.trim();
        if t.is_empty() || !t.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidIssuer(s!(raw)));
        }
        let stripped = t.trim_start_matches('0');
        Ok(Self(s!(if stripped.is_empty() { "0" } else { stripped })))
    }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for IssuerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accession folder name under an issuer's archive path ("operation id").
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilingId(String);

impl FilingId {
    pub fn new(raw: impl Into<String>) -> Self { Self(raw.into()) }

    pub fn as_str(&self) -> &str { &self.0 }

    /// The segment right before the document filename:
    /// `.../data/320193/000032019323000010/wf-form4.xml` → `000032019323000010`.
    pub fn from_document_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let mut segs = path.rsplit('/');
        let file = segs.next()?;
        let folder = segs.next()?;
        if file.is_empty() || folder.is_empty() || folder.contains(':') {
            return None;
        }
        Some(Self(s!(folder)))
    }
}

impl fmt::Display for FilingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive day-granularity window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidWindow(format!("start {start} is after end {end}")));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::InvalidWindow(format!("'{s}': {e}")))
}

/// Leading `YYYY-MM-DD` of a listing or XML date, if it parses.
pub fn parse_day_prefix(s: &str) -> Option<NaiveDate> {
    let t = s.trim();
    let day = t.get(..10).unwrap_or(t);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// One reported derivative transaction from a Form 4 document.
/// Missing document fields default to "" / false / 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactionRecord {
    /// Issuer CIK as written in the document.
    pub cik: String,
    /// Issuer the run was started for; partition key.
    pub parent_cik: IssuerId,
    pub name: String,
    pub ticker: String,
    pub rpt_owner_name: String,
    pub rpt_owner_cik: String,
    pub is_director: bool,
    pub is_officer: bool,
    pub is_ten_percent_owner: bool,
    pub is_other: bool,
    pub officer_title: String,
    pub security_title: String,
    pub transaction_date: Option<NaiveDate>,
    pub form_type: String,
    pub code: String,
    pub equity_swap: bool,
    pub shares: f64,
    pub acquired_disposed_code: String,
    pub shares_owned_following_transaction: f64,
    pub direct_or_indirect_ownership: String,
    /// Source document URL.
    pub form4_link: String,
}

impl TransactionRecord {
    pub fn filing_id(&self) -> Option<FilingId> {
        FilingId::from_document_url(&self.form4_link)
    }
}

/// One day of market prices for a ticker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: f64,
}

/// Transaction joined with its day's prices and derived figures.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnrichedRecord {
    pub tx: TransactionRecord,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
    pub daily_return: Option<f64>,
    pub percent_change: Option<f64>,
    pub range: Option<f64>,
    pub average_price: Option<f64>,
    pub shares_value_usd: Option<f64>,
}

impl EnrichedRecord {
    pub fn from_transaction(tx: TransactionRecord) -> Self {
        Self { tx, ..Self::default() }
    }

    pub fn issuer(&self) -> &IssuerId { &self.tx.parent_cik }
}
