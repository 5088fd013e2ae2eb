// tests/common/mod.rs
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use form4_scrape::config::AppOptions;
use form4_scrape::core::{MemoryFetch, Page, RecordingSleeper};
use form4_scrape::runner::Runner;

pub const BASE: &str = "https://edgar.test";

pub const THROTTLE_PAGE: &str =
    "<html><head><title>SEC.gov | Request Rate Threshold Exceeded</title></head><body>slow down</body></html>";

/// One filing folder with a single Form 4 document.
pub struct Filing {
    pub id: &'static str,
    pub listed: &'static str,
    /// (transaction date, shares) per derivative transaction
    pub txs: Vec<(&'static str, f64)>,
}

impl Filing {
    pub fn new(id: &'static str, listed: &'static str, txs: Vec<(&'static str, f64)>) -> Self {
        Self { id, listed, txs }
    }

    pub fn doc_url(&self, cik: &str) -> String {
        format!("{BASE}/Archives/edgar/data/{cik}/{}/form4.xml", self.id)
    }
}

pub fn listing_url(cik: &str) -> String {
    format!("{BASE}/Archives/edgar/data/{cik}/")
}

pub fn folder_url(cik: &str, id: &str) -> String {
    format!("{BASE}/Archives/edgar/data/{cik}/{id}/")
}

pub fn index_url(cik: &str, id: &str) -> String {
    format!("{BASE}/Archives/edgar/data/{cik}/{id}/{id}-index.html")
}

pub fn listing_page(cik: &str, filings: &[Filing]) -> String {
    let rows: String = filings
        .iter()
        .map(|f| {
            format!(
                "<tr><td><a href=\"/Archives/edgar/data/{cik}/{id}\">{id}</a></td><td></td><td>{date} 10:00:00</td></tr>\n",
                id = f.id,
                date = f.listed
            )
        })
        .collect();
    format!(
        "<html><head><title>Index of /Archives/edgar/data/{cik}</title></head><body>\
         <table summary=\"Directory Listing for /Archives/edgar/data/{cik}\">\
         <tr><th>Name</th><th>Size</th><th>Last Modified</th></tr>\n{rows}</table></body></html>"
    )
}

pub fn folder_page(cik: &str, id: &str) -> String {
    format!(
        "<table summary=\"Directory Listing for /Archives/edgar/data/{cik}/{id}\">\
         <tr><td><a href=\"/Archives/edgar/data/{cik}/{id}/form4.xml\">form4.xml</a></td></tr>\
         <tr><td><a href=\"/Archives/edgar/data/{cik}/{id}/{id}-index.html\">{id}-index.html</a></td></tr>\
         </table>"
    )
}

pub fn index_page(cik: &str, id: &str) -> String {
    format!(
        "<table class=\"tableFile\" summary=\"Document Format Files\">\
         <tr><th>Seq</th><th>Description</th><th>Document</th><th>Type</th><th>Size</th></tr>\
         <tr><td>1</td><td>FORM 4</td><td><a href=\"/Archives/edgar/data/{cik}/{id}/form4.xml\">form4.xml</a></td><td>4</td><td>3 KB</td></tr>\
         </table>"
    )
}

pub fn form4_doc(cik: &str, ticker: &str, txs: &[(&str, f64)]) -> String {
    let body: String = txs
        .iter()
        .map(|(date, shares)| {
            format!(
                "<derivativeTransaction>\
                 <securityTitle><value>Stock Option</value></securityTitle>\
                 <transactionDate><value>{date}</value></transactionDate>\
                 <transactionCoding><transactionFormType>4</transactionFormType><transactionCode>M</transactionCode></transactionCoding>\
                 <transactionAmounts><transactionShares><value>{shares}</value></transactionShares>\
                 <transactionAcquiredDisposedCode><value>D</value></transactionAcquiredDisposedCode></transactionAmounts>\
                 </derivativeTransaction>"
            )
        })
        .collect();
    format!(
        "<ownershipDocument><issuer><issuerCik>{cik:0>10}</issuerCik><issuerName>Issuer {cik}</issuerName>\
         <issuerTradingSymbol>{ticker}</issuerTradingSymbol></issuer>\
         <reportingOwner><reportingOwnerId><rptOwnerCik>0000000099</rptOwnerCik><rptOwnerName>DOE JANE</rptOwnerName></reportingOwnerId>\
         <reportingOwnerRelationship><isOfficer>1</isOfficer><officerTitle>CFO</officerTitle></reportingOwnerRelationship></reportingOwner>\
         <derivativeTable>{body}</derivativeTable></ownershipDocument>"
    )
}

/// Register listing, folder, index and document pages for `cik`.
pub fn serve(fetch: MemoryFetch, cik: &str, filings: &[Filing]) -> MemoryFetch {
    let mut fetch = fetch.page(listing_url(cik), listing_page(cik, filings));
    for f in filings {
        fetch = fetch
            .page(folder_url(cik, f.id), folder_page(cik, f.id))
            .page(index_url(cik, f.id), index_page(cik, f.id))
            .page(f.doc_url(cik), form4_doc(cik, "TICK", &f.txs));
    }
    fetch
}

pub fn throttled() -> Page {
    Page { status: 403, body: THROTTLE_PAGE.to_string() }
}

pub fn options(store: &Path) -> AppOptions {
    let mut opts = AppOptions::default();
    opts.crawl.base_url = BASE.to_string();
    opts.store.root = store.to_path_buf();
    opts
}

pub fn runner(opts: AppOptions, fetch: &Arc<MemoryFetch>, sleeper: &Arc<RecordingSleeper>) -> Runner {
    Runner::new(opts, Arc::clone(fetch)).with_sleeper(Arc::clone(sleeper))
}
