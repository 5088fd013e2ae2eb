// src/enrich.rs
//
// TransactionRecord → EnrichedRecord. The default enricher joins each
// transaction with its ticker's price bar for the transaction day and derives
// return/range/value figures from it. Days without a bar (weekends, holidays)
// that fall between the ticker's first and last bar take the previous trading
// day's prices with zero volume; days outside that span get no prices.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{EnrichedRecord, PriceBar, TransactionRecord};

pub trait Enricher: Send + Sync {
    fn enrich(&self, batch: Vec<TransactionRecord>) -> Result<Vec<EnrichedRecord>>;
}

/// Daily bars for a ticker over `[start, end]`.
pub trait PriceSource: Send + Sync {
    fn daily_bars(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>>;
}

/// No market data: every price field stays empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPrices;

impl PriceSource for NoPrices {
    fn daily_bars(&self, _ticker: &str, _start: NaiveDate, _end: NaiveDate) -> Result<Vec<PriceBar>> {
        Ok(Vec::new())
    }
}

/// In-memory bars keyed by ticker.
#[derive(Clone, Debug, Default)]
pub struct StaticPrices {
    bars: HashMap<String, Vec<PriceBar>>,
}

impl StaticPrices {
    pub fn new() -> Self { Self::default() }

    pub fn with_bars(mut self, ticker: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        self.bars.entry(ticker.into()).or_default().extend(bars);
        self
    }
}

impl PriceSource for StaticPrices {
    fn daily_bars(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>> {
        Ok(self
            .bars
            .get(ticker)
            .map(|v| v.iter().filter(|b| b.date >= start && b.date <= end).copied().collect())
            .unwrap_or_default())
    }
}

pub struct PriceJoinEnricher<P> {
    prices: P,
}

impl<P: PriceSource> PriceJoinEnricher<P> {
    pub fn new(prices: P) -> Self { Self { prices } }
}

impl Default for PriceJoinEnricher<NoPrices> {
    fn default() -> Self { Self::new(NoPrices) }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn bar_for(bars: &BTreeMap<NaiveDate, PriceBar>, day: NaiveDate) -> Option<PriceBar> {
    let (first, last) = (bars.keys().next()?, bars.keys().next_back()?);
    if day < *first || day > *last {
        return None;
    }
    let (date, bar) = bars.range(..=day).next_back()?;
    if *date == day {
        Some(*bar)
    } else {
        Some(PriceBar { date: day, volume: 0.0, ..*bar })
    }
}

/// Attach `bar` and the figures derived from it.
pub fn apply_bar(tx: TransactionRecord, bar: Option<&PriceBar>) -> EnrichedRecord {
    let Some(b) = bar else {
        return EnrichedRecord::from_transaction(tx);
    };
    let daily_return = (b.open != 0.0).then(|| (b.close - b.open) / b.open);
    let average = (b.high + b.low) / 2.0;
    let shares = tx.shares;
    EnrichedRecord {
        tx,
        open: Some(round4(b.open)),
        high: Some(round4(b.high)),
        low: Some(round4(b.low)),
        close: Some(round4(b.close)),
        adj_close: Some(round4(b.adj_close)),
        volume: Some(b.volume),
        daily_return: daily_return.map(round4),
        percent_change: daily_return.map(|r| round4(r * 100.0)),
        range: Some(round4(b.high - b.low)),
        average_price: Some(round4(average)),
        shares_value_usd: Some(round4(average * shares)),
    }
}

impl<P: PriceSource> Enricher for PriceJoinEnricher<P> {
    fn enrich(&self, batch: Vec<TransactionRecord>) -> Result<Vec<EnrichedRecord>> {
        // one price lookup per ticker, spanning its transactions (with slack for fills)
        let mut spans: HashMap<&str, (NaiveDate, NaiveDate)> = HashMap::new();
        for tx in &batch {
            if let (false, Some(d)) = (tx.ticker.is_empty(), tx.transaction_date) {
                let e = spans.entry(tx.ticker.as_str()).or_insert((d, d));
                e.0 = e.0.min(d);
                e.1 = e.1.max(d);
            }
        }

        let slack = chrono::Days::new(7);
        let mut tables: HashMap<String, BTreeMap<NaiveDate, PriceBar>> = HashMap::new();
        for (ticker, (lo, hi)) in spans {
            let start = lo.checked_sub_days(slack).unwrap_or(lo);
            let end = hi.checked_add_days(slack).unwrap_or(hi);
            let bars = self.prices.daily_bars(ticker, start, end)?;
            if bars.is_empty() {
                logd!("{ticker}: no price bars for {start}..{end}");
            }
            tables.insert(s!(ticker), bars.into_iter().map(|b| (b.date, b)).collect());
        }

        Ok(batch
            .into_iter()
            .map(|tx| {
                let bar = tx
                    .transaction_date
                    .and_then(|d| tables.get(&tx.ticker).and_then(|t| bar_for(t, d)));
                apply_bar(tx, bar.as_ref())
            })
            .collect())
    }
}
