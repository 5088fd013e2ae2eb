// src/store.rs
//
// Partitioned, append-only columnar record store:
//
//   {root}/parent_cik={issuer}/part-00000.parquet
//                              part-00001.parquet ...
//
// Each part file is written once (tempfile in the partition dir, then renamed)
// and never touched again. Columns are `merge::COLUMNS` plus the row hash.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{ArrowError, DataType, Field, Schema, SchemaRef};
use chrono::{Datelike, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use tempfile::NamedTempFile;

use crate::config::consts::PARTITION_KEY;
use crate::error::{Error, Result};
use crate::merge::{COLUMNS, HASH_COLUMN};
use crate::model::{EnrichedRecord, FilingId, IssuerId, TransactionRecord};

const PART_PREFIX: &str = "part-";
const PART_EXT: &str = ".parquet";

// 1970-01-01 counted from 0001-01-01 (day 1)
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

const FLAG_COLUMNS: [&str; 5] = ["is_director", "is_officer", "is_ten_percent_owner", "is_other", "equity_swap"];
const SHARE_COLUMNS: [&str; 2] = ["shares", "shares_owned_following_transaction"];
const DATE_COLUMN: &str = "transaction_date";
const KEY_COLUMN: &str = "parent_cik";
const FIRST_PRICE_COLUMN: usize = 21;

/// One persisted row and its stored hash.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRow {
    pub record: EnrichedRecord,
    pub hash: String,
}

#[derive(Clone, Debug)]
pub struct PartitionStore {
    root: PathBuf,
}

impl PartitionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn partition_dir(&self, issuer: &IssuerId) -> PathBuf {
        self.root.join(format!("{PARTITION_KEY}={issuer}"))
    }

    /// Part files of a partition in write order. Missing partition → empty.
    pub fn part_files(&self, issuer: &IssuerId) -> Result<Vec<PathBuf>> {
        let dir = self.partition_dir(issuer);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|e| Error::storage(&dir, e.to_string()))?;
        let mut parts = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::storage(&dir, e.to_string()))?.path();
            if part_index(&path).is_some() {
                parts.push(path);
            }
        }
        parts.sort_by_key(|p| part_index(p));
        Ok(parts)
    }

    /// Every row of the issuer's partition. Any unreadable or malformed part is fatal.
    pub fn read_partition(&self, issuer: &IssuerId) -> Result<Vec<StoredRow>> {
        let mut out = Vec::new();
        for path in self.part_files(issuer)? {
            read_part(&path, &mut out)?;
        }
        Ok(out)
    }

    /// Filing ids already represented in the issuer's partition.
    pub fn seen_filings(&self, issuer: &IssuerId) -> Result<BTreeSet<FilingId>> {
        let seen: BTreeSet<FilingId> = self
            .read_partition(issuer)?
            .iter()
            .filter(|r| r.record.issuer() == issuer)
            .filter_map(|r| r.record.tx.filing_id())
            .collect();
        logd!("CIK: '{issuer}'| {} filings already stored", seen.len());
        Ok(seen)
    }

    /// Write `rows` as the next part file. Returns its path.
    pub fn append(&self, issuer: &IssuerId, rows: &[(String, EnrichedRecord)]) -> Result<PathBuf> {
        let dir = self.partition_dir(issuer);
        fs::create_dir_all(&dir).map_err(|e| Error::storage(&dir, e.to_string()))?;

        let next = self
            .part_files(issuer)?
            .iter()
            .filter_map(|p| part_index(p))
            .max()
            .map_or(0, |n| n + 1);
        let target = dir.join(format!("{PART_PREFIX}{next:05}{PART_EXT}"));

        let batch = to_batch(rows).map_err(|e| Error::storage(&target, e.to_string()))?;
        let tmp = NamedTempFile::new_in(&dir).map_err(|e| Error::storage(&dir, e.to_string()))?;
        let mut writer = ArrowWriter::try_new(tmp.as_file(), batch.schema(), None)
            .map_err(|e| Error::storage(&target, e.to_string()))?;
        writer.write(&batch).map_err(|e| Error::storage(&target, e.to_string()))?;
        writer.close().map_err(|e| Error::storage(&target, e.to_string()))?;

        tmp.as_file().sync_all()?;
        tmp.persist_noclobber(&target)
            .map_err(|e| Error::storage(&target, e.error.to_string()))?;
        Ok(target)
    }
}

fn part_index(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix(PART_PREFIX)?.strip_suffix(PART_EXT)?.parse().ok()
}

/* ---------------- Schema ---------------- */

fn column_type(index: usize, name: &str) -> (DataType, bool) {
    if name == KEY_COLUMN {
        (DataType::Int64, true)
    } else if FLAG_COLUMNS.contains(&name) {
        (DataType::Boolean, false)
    } else if SHARE_COLUMNS.contains(&name) {
        (DataType::Float64, false)
    } else if name == DATE_COLUMN {
        (DataType::Date32, true)
    } else if index >= FIRST_PRICE_COLUMN {
        (DataType::Float64, true)
    } else {
        (DataType::Utf8, false)
    }
}

fn schema() -> SchemaRef {
    let mut fields: Vec<Field> = COLUMNS
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let (kind, nullable) = column_type(i, name);
            Field::new(*name, kind, nullable)
        })
        .collect();
    fields.push(Field::new(HASH_COLUMN, DataType::Utf8, false));
    Arc::new(Schema::new(fields))
}

fn epoch_days(d: NaiveDate) -> i32 {
    d.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

fn from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(EPOCH_DAYS_FROM_CE)?)
}

/* ---------------- Write ---------------- */

fn to_batch(rows: &[(String, EnrichedRecord)]) -> std::result::Result<RecordBatch, ArrowError> {
    let text = |f: fn(&EnrichedRecord) -> &str| -> ArrayRef {
        Arc::new(StringArray::from_iter_values(rows.iter().map(|(_, r)| f(r))))
    };
    let flag = |f: fn(&EnrichedRecord) -> bool| -> ArrayRef {
        Arc::new(BooleanArray::from(rows.iter().map(|(_, r)| f(r)).collect::<Vec<_>>()))
    };
    let number = |f: fn(&EnrichedRecord) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|(_, r)| f(r))))
    };
    // non-finite prices are stored as missing
    let price = |f: fn(&EnrichedRecord) -> Option<f64>| -> ArrayRef {
        Arc::new(Float64Array::from(
            rows.iter().map(|(_, r)| f(r).filter(|v| v.is_finite())).collect::<Vec<_>>(),
        ))
    };
    let dates: ArrayRef = Arc::new(Date32Array::from(
        rows.iter().map(|(_, r)| r.tx.transaction_date.map(epoch_days)).collect::<Vec<_>>(),
    ));
    let keys: ArrayRef = Arc::new(Int64Array::from(
        rows.iter().map(|(_, r)| r.tx.parent_cik.as_str().parse::<i64>().ok()).collect::<Vec<_>>(),
    ));
    let hashes: ArrayRef = Arc::new(StringArray::from_iter_values(rows.iter().map(|(h, _)| h.as_str())));

    RecordBatch::try_new(
        schema(),
        vec![
            text(|r| r.tx.cik.as_str()),
            keys,
            text(|r| r.tx.name.as_str()),
            text(|r| r.tx.ticker.as_str()),
            text(|r| r.tx.rpt_owner_name.as_str()),
            text(|r| r.tx.rpt_owner_cik.as_str()),
            flag(|r| r.tx.is_director),
            flag(|r| r.tx.is_officer),
            flag(|r| r.tx.is_ten_percent_owner),
            flag(|r| r.tx.is_other),
            text(|r| r.tx.officer_title.as_str()),
            text(|r| r.tx.security_title.as_str()),
            dates,
            text(|r| r.tx.form_type.as_str()),
            text(|r| r.tx.code.as_str()),
            flag(|r| r.tx.equity_swap),
            number(|r| r.tx.shares),
            text(|r| r.tx.acquired_disposed_code.as_str()),
            number(|r| r.tx.shares_owned_following_transaction),
            text(|r| r.tx.direct_or_indirect_ownership.as_str()),
            text(|r| r.tx.form4_link.as_str()),
            price(|r| r.open),
            price(|r| r.high),
            price(|r| r.low),
            price(|r| r.close),
            price(|r| r.adj_close),
            price(|r| r.volume),
            price(|r| r.daily_return),
            price(|r| r.percent_change),
            price(|r| r.range),
            price(|r| r.average_price),
            price(|r| r.shares_value_usd),
            hashes,
        ],
    )
}

/* ---------------- Read ---------------- */

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> std::result::Result<&'a T, String> {
    let array = batch.column_by_name(name).ok_or_else(|| format!("missing column '{name}'"))?;
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| format!("column '{name}' has type {}", array.data_type()))
}

fn opt(a: &Float64Array, i: usize) -> Option<f64> {
    a.is_valid(i).then(|| a.value(i))
}

fn read_part(path: &Path, out: &mut Vec<StoredRow>) -> Result<()> {
    let file = File::open(path).map_err(|e| Error::storage(path, e.to_string()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|b| b.build())
        .map_err(|e| Error::storage(path, e.to_string()))?;

    let expected = schema();
    for batch in reader {
        let batch = batch.map_err(|e| Error::storage(path, e.to_string()))?;
        let names = batch.schema().fields().iter().map(|f| f.name().clone()).collect::<Vec<_>>();
        if !names.iter().map(String::as_str).eq(expected.fields().iter().map(|f| f.name().as_str())) {
            return Err(Error::storage(path, "unexpected columns"));
        }
        decode_batch(&batch, out).map_err(|e| Error::storage(path, e))?;
    }
    Ok(())
}

fn decode_batch(batch: &RecordBatch, out: &mut Vec<StoredRow>) -> std::result::Result<(), String> {
    let s = |name: &str| column::<StringArray>(batch, name);
    let b = |name: &str| column::<BooleanArray>(batch, name);
    let n = |name: &str| column::<Float64Array>(batch, name);

    let (cik, name, ticker) = (s("cik")?, s("name")?, s("ticker")?);
    let parent_cik = column::<Int64Array>(batch, KEY_COLUMN)?;
    let (owner, owner_cik, officer_title, security_title) =
        (s("rpt_owner_name")?, s("rpt_owner_cik")?, s("officer_title")?, s("security_title")?);
    let (form_type, code, ad_code, ownership, link) = (
        s("form_type")?,
        s("code")?,
        s("acquired_disposed_code")?,
        s("direct_or_indirect_ownership")?,
        s("form4_link")?,
    );
    let (director, officer, ten_pct, other, swap) =
        (b("is_director")?, b("is_officer")?, b("is_ten_percent_owner")?, b("is_other")?, b("equity_swap")?);
    let (shares, owned) = (n("shares")?, n("shares_owned_following_transaction")?);
    let dates = column::<Date32Array>(batch, DATE_COLUMN)?;
    let (open, high, low, close, adj_close, volume) =
        (n("open")?, n("high")?, n("low")?, n("close")?, n("adj_close")?, n("volume")?);
    let (daily_return, percent_change, range, average_price, value_usd) = (
        n("daily_return")?,
        n("percent_change")?,
        n("range")?,
        n("average_price")?,
        n("shares_value_usd")?,
    );
    let hashes = s(HASH_COLUMN)?;

    for i in 0..batch.num_rows() {
        let parent = if parent_cik.is_valid(i) {
            IssuerId::parse(&parent_cik.value(i).to_string()).map_err(|e| format!("row {i}: parent_cik: {e}"))?
        } else {
            IssuerId::default()
        };
        let transaction_date = if dates.is_valid(i) {
            Some(from_epoch_days(dates.value(i)).ok_or_else(|| format!("row {i}: transaction_date out of range"))?)
        } else {
            None
        };
        let tx = TransactionRecord {
            cik: s!(cik.value(i)),
            parent_cik: parent,
            name: s!(name.value(i)),
            ticker: s!(ticker.value(i)),
            rpt_owner_name: s!(owner.value(i)),
            rpt_owner_cik: s!(owner_cik.value(i)),
            is_director: director.value(i),
            is_officer: officer.value(i),
            is_ten_percent_owner: ten_pct.value(i),
            is_other: other.value(i),
            officer_title: s!(officer_title.value(i)),
            security_title: s!(security_title.value(i)),
            transaction_date,
            form_type: s!(form_type.value(i)),
            code: s!(code.value(i)),
            equity_swap: swap.value(i),
            shares: shares.value(i),
            acquired_disposed_code: s!(ad_code.value(i)),
            shares_owned_following_transaction: owned.value(i),
            direct_or_indirect_ownership: s!(ownership.value(i)),
            form4_link: s!(link.value(i)),
        };
        out.push(StoredRow {
            record: EnrichedRecord {
                tx,
                open: opt(open, i),
                high: opt(high, i),
                low: opt(low, i),
                close: opt(close, i),
                adj_close: opt(adj_close, i),
                volume: opt(volume, i),
                daily_return: opt(daily_return, i),
                percent_change: opt(percent_change, i),
                range: opt(range, i),
                average_price: opt(average_price, i),
                shares_value_usd: opt(value_usd, i),
            },
            hash: s!(hashes.value(i)),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge;

    fn rec(issuer: &str, link: &str) -> EnrichedRecord {
        EnrichedRecord::from_transaction(TransactionRecord {
            parent_cik: IssuerId::parse(issuer).unwrap(),
            transaction_date: NaiveDate::from_ymd_opt(2020, 5, 6),
            security_title: s!("Stock Option, right to buy"),
            form4_link: s!(link),
            ..TransactionRecord::default()
        })
    }

    fn hashed(r: EnrichedRecord) -> (String, EnrichedRecord) {
        (merge::record_hash(&r), r)
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path().join("nope"));
        let issuer = IssuerId::parse("1").unwrap();
        assert!(store.read_partition(&issuer).unwrap().is_empty());
        assert!(store.seen_filings(&issuer).unwrap().is_empty());
    }

    #[test]
    fn appends_numbered_parts_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let issuer = IssuerId::parse("320193").unwrap();

        let p0 = store.append(&issuer, &[hashed(rec("320193", "https://s/data/320193/0001/a.xml"))]).unwrap();
        let p1 = store.append(&issuer, &[hashed(rec("320193", "https://s/data/320193/0002/b.xml"))]).unwrap();
        assert!(p0.ends_with("parent_cik=320193/part-00000.parquet"));
        assert!(p1.ends_with("parent_cik=320193/part-00001.parquet"));

        let rows = store.read_partition(&issuer).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].record.tx.security_title, "Stock Option, right to buy");
        assert_eq!(rows[0].hash, merge::record_hash(&rows[0].record));

        let seen: Vec<String> = store.seen_filings(&issuer).unwrap().into_iter().map(|f| f.to_string()).collect();
        assert_eq!(seen, vec!["0001", "0002"]);
    }

    #[test]
    fn typed_columns_read_back_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let issuer = IssuerId::parse("320193").unwrap();
        let mut r = rec("320193", "https://s/data/320193/0001/a.xml");
        r.tx.is_officer = true;
        r.tx.shares = 1250.5;
        r.close = Some(131.25);
        r.volume = Some(0.0);
        let mut undated = rec("320193", "https://s/data/320193/0001/b.xml");
        undated.tx.transaction_date = None;

        store.append(&issuer, &[hashed(r.clone()), hashed(undated.clone())]).unwrap();
        let back: Vec<EnrichedRecord> = store.read_partition(&issuer).unwrap().into_iter().map(|s| s.record).collect();
        assert_eq!(back, vec![r, undated]);
    }

    #[test]
    fn epoch_day_conversion() {
        let d = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(epoch_days(d), 0);
        let later = NaiveDate::from_ymd_opt(2021, 3, 5).unwrap();
        assert_eq!(from_epoch_days(epoch_days(later)), Some(later));
    }

    #[test]
    fn seen_ignores_rows_of_other_issuers() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let issuer = IssuerId::parse("320193").unwrap();
        store
            .append(&issuer, &[hashed(rec("320193", "https://s/1/0001/a.xml")), hashed(rec("42", "https://s/1/0009/z.xml"))])
            .unwrap();
        let seen = store.seen_filings(&issuer).unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen.contains(&FilingId::new("0001")));
    }

    #[test]
    fn corrupt_part_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let issuer = IssuerId::parse("7").unwrap();
        let pdir = store.partition_dir(&issuer);
        fs::create_dir_all(&pdir).unwrap();
        fs::write(pdir.join("part-00000.parquet"), "garbage,header\n1,2\n").unwrap();

        assert!(matches!(store.read_partition(&issuer), Err(Error::Storage { .. })));
        assert!(matches!(store.seen_filings(&issuer), Err(Error::Storage { .. })));
    }

    #[test]
    fn stray_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let issuer = IssuerId::parse("7").unwrap();
        let pdir = store.partition_dir(&issuer);
        fs::create_dir_all(&pdir).unwrap();
        fs::write(pdir.join(".tmpXYZ"), "half written").unwrap();
        fs::write(pdir.join("part-00000.csv"), "old,format\n").unwrap();
        assert!(store.read_partition(&issuer).unwrap().is_empty());
    }
}
