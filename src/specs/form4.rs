// src/specs/form4.rs
//! Form 4 ownership document (XML) → `TransactionRecord`s.
//!
//! One record per `<derivativeTransaction>`. Header fields (issuer, reporting
//! owner, relationship) are read once and copied onto every record. Anything
//! missing becomes `""` / `false` / `0`; a document without derivative
//! transactions yields no records.

use crate::core::html::{elements, first_inner, strip_tags};
use crate::core::sanitize::{parse_flag, parse_number};
use crate::model::{parse_day_prefix, IssuerId, TransactionRecord};

/// Turns a fetched document into zero or more records for `parent`.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, doc: &str, parent: &IssuerId, link: &str) -> Vec<TransactionRecord>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Form4Parser;

/// Text at a nested element path (`["transactionAmounts", "transactionShares", "value"]`), or "".
fn text_at(block: &str, path: &[&str]) -> String {
    let mut cur = block;
    for name in path {
        match first_inner(cur, name) {
            Some(inner) => cur = inner,
            None => return String::new(),
        }
    }
    strip_tags(cur)
}

struct Header {
    cik: String,
    name: String,
    ticker: String,
    rpt_owner_name: String,
    rpt_owner_cik: String,
    is_director: bool,
    is_officer: bool,
    is_ten_percent_owner: bool,
    is_other: bool,
    officer_title: String,
}

impl Header {
    fn read(doc: &str) -> Self {
        let issuer = first_inner(doc, "issuer").unwrap_or("");
        let owner = first_inner(doc, "reportingOwner").unwrap_or("");
        let rel = first_inner(owner, "reportingOwnerRelationship").unwrap_or("");
        Self {
            cik: text_at(issuer, &["issuerCik"]),
            name: text_at(issuer, &["issuerName"]),
            ticker: text_at(issuer, &["issuerTradingSymbol"]),
            rpt_owner_name: text_at(owner, &["rptOwnerName"]),
            rpt_owner_cik: text_at(owner, &["rptOwnerCik"]),
            is_director: parse_flag(&text_at(rel, &["isDirector"])),
            is_officer: parse_flag(&text_at(rel, &["isOfficer"])),
            is_ten_percent_owner: parse_flag(&text_at(rel, &["isTenPercentOwner"])),
            is_other: parse_flag(&text_at(rel, &["isOther"])),
            officer_title: text_at(rel, &["officerTitle"]),
        }
    }
}

impl DocumentParser for Form4Parser {
    fn parse(&self, doc: &str, parent: &IssuerId, link: &str) -> Vec<TransactionRecord> {
        let h = Header::read(doc);
        let table = first_inner(doc, "derivativeTable").unwrap_or("");

        elements(table, "derivativeTransaction")
            .into_iter()
            .map(|(_, tx)| TransactionRecord {
                cik: h.cik.clone(),
                parent_cik: parent.clone(),
                name: h.name.clone(),
                ticker: h.ticker.clone(),
                rpt_owner_name: h.rpt_owner_name.clone(),
                rpt_owner_cik: h.rpt_owner_cik.clone(),
                is_director: h.is_director,
                is_officer: h.is_officer,
                is_ten_percent_owner: h.is_ten_percent_owner,
                is_other: h.is_other,
                officer_title: h.officer_title.clone(),
                security_title: text_at(tx, &["securityTitle", "value"]),
                transaction_date: parse_day_prefix(&text_at(tx, &["transactionDate", "value"])),
                form_type: text_at(tx, &["transactionCoding", "transactionFormType"]),
                code: text_at(tx, &["transactionCoding", "transactionCode"]),
                equity_swap: parse_flag(&text_at(tx, &["transactionCoding", "equitySwapInvolved"])),
                shares: parse_number(&text_at(tx, &["transactionAmounts", "transactionShares", "value"])),
                acquired_disposed_code: text_at(
                    tx,
                    &["transactionAmounts", "transactionAcquiredDisposedCode", "value"],
                ),
                shares_owned_following_transaction: parse_number(&text_at(
                    tx,
                    &["postTransactionAmounts", "sharesOwnedFollowingTransaction", "value"],
                )),
                direct_or_indirect_ownership: text_at(
                    tx,
                    &["ownershipNature", "directOrIndirectOwnership", "value"],
                ),
                form4_link: s!(link),
            })
            .collect()
    }
}
