// src/specs/filing.rs
//! Scraping *spec* for one filing package.
//!
//! Two pages per filing:
//! - the package folder listing (`/Archives/edgar/data/{cik}/{filing}/`), which links
//!   the filing index (`…-index.html`);
//! - the filing index, whose "Document Format Files" table lists each document
//!   with its form type (cell 3) and link (cell 2).

use crate::config::consts::{ARCHIVE_PATH, DOCUMENT_EXT, INDEX_SUFFIX};
use crate::core::html::{self, hrefs, last_segment, strip_tags, table_rows};
use crate::model::{FilingId, IssuerId};

use super::listing::summary_for;

pub fn folder_url(base: &str, issuer: &IssuerId, filing: &FilingId) -> String {
    format!("{base}{ARCHIVE_PATH}{issuer}/{filing}/")
}

/// First `-index.html` link in the package listing, as written (site-relative).
pub fn index_link(doc: &str, issuer: &IssuerId, filing: &FilingId) -> Option<String> {
    let summary = summary_for(&format!("{issuer}/{filing}"));
    let table = html::table_with_attrs(doc, &[("summary", summary.as_str())])?;
    hrefs(table).into_iter().find(|h| h.ends_with(INDEX_SUFFIX))
}

/// Absolute URL for a link found on an EDGAR page.
pub fn absolute(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        s!(href)
    } else if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    }
}

fn is_wanted(kind: &str, forms: &[String]) -> bool {
    let kind = kind.trim();
    forms.iter().any(|f| f.trim().eq_ignore_ascii_case(kind))
}

/// Distinct document URLs of documents whose type is one of `forms`.
/// Per row only the first matching `.xml` link counts; order of first appearance is kept.
pub fn document_links(doc: &str, base: &str, issuer: &IssuerId, filing: &FilingId, forms: &[String]) -> Vec<String> {
    let Some(table) = html::table_with_attrs(
        doc,
        &[("class", "tableFile"), ("summary", "Document Format Files")],
    ) else {
        return Vec::new();
    };

    let mut out: Vec<String> = Vec::new();
    for cells in table_rows(table) {
        if cells.len() < 4 || !is_wanted(&strip_tags(cells[3]), forms) {
            continue;
        }
        let Some(href) = hrefs(cells[2]).into_iter().find(|h| h.ends_with(DOCUMENT_EXT)) else {
            continue;
        };
        let url = format!("{}{}", folder_url(base, issuer, filing), last_segment(&href));
        if !out.contains(&url) {
            out.push(url);
        }
    }
    out
}
