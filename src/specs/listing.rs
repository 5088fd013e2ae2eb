// src/specs/listing.rs
//! Scraping *spec* for an issuer's archive directory listing
//! (`/Archives/edgar/data/{cik}/`).
//!
//! The listing is a three-column table (Name | Size | Last Modified) whose
//! `summary` attribute names the directory. Every row with at least two cells
//! is a filing folder: the id is the last segment of the first anchor in cell 0,
//! the date is the day part of cell 2.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::config::consts::ARCHIVE_PATH;
use crate::core::html::{self, hrefs, last_segment, strip_tags, table_rows};
use crate::model::{parse_day_prefix, DateWindow, FilingId, IssuerId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingRow {
    pub id: FilingId,
    pub date: Option<NaiveDate>,
}

pub fn summary_for(path_tail: &str) -> String {
    format!("Directory Listing for {ARCHIVE_PATH}{path_tail}")
}

pub fn parse(doc: &str, issuer: &IssuerId) -> Vec<ListingRow> {
    let summary = summary_for(issuer.as_str());
    let Some(table) = html::table_with_attrs(doc, &[("summary", summary.as_str())]) else {
        logd!("CIK: '{issuer}'| no directory listing table");
        return Vec::new();
    };

    let mut out = Vec::new();
    for cells in table_rows(table) {
        if cells.len() < 2 {
            continue;
        }
        let Some(href) = hrefs(cells[0]).into_iter().next() else { continue };
        let id = last_segment(&href);
        if id.is_empty() {
            continue;
        }
        let date = cells.get(2).and_then(|c| parse_day_prefix(&strip_tags(c)));
        out.push(ListingRow { id: FilingId::new(id), date });
    }
    out
}

/// Ids of rows inside the window (all rows without one). Undated rows never match a window.
pub fn select(rows: &[ListingRow], window: Option<&DateWindow>) -> BTreeSet<FilingId> {
    rows.iter()
        .filter(|r| match (window, r.date) {
            (None, _) => true,
            (Some(w), Some(d)) => w.contains(d),
            (Some(_), None) => {
                logd!("listing row {} has no parseable date; excluded by window", r.id);
                false
            }
        })
        .map(|r| r.id.clone())
        .collect()
}
