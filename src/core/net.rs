// src/core/net.rs
//
// HTTP GET behind a small trait so the crawl loop can run against canned pages.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use reqwest::blocking::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::config::consts::*;
use crate::config::CrawlOptions;
use crate::error::{Error, Result};

/// A fetched page. The status is kept because EDGAR serves its throttle page
/// with a non-2xx code, and that page must still be recognised by its title.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Fetch: Send + Sync {
    /// One GET. Transport failures are `Error::Network`; any HTTP status is a `Page`.
    fn get(&self, url: &str) -> Result<Page>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn get(&self, url: &str) -> Result<Page> {
        (**self).get(url)
    }
}

impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    fn get(&self, url: &str) -> Result<Page> {
        (**self).get(url)
    }
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(opts: &CrawlOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static(HDR_CONNECTION));
        headers.insert(header::ACCEPT, HeaderValue::from_static(HDR_ACCEPT));
        headers.insert("X-Requested-With", HeaderValue::from_static(HDR_X_REQUESTED_WITH));
        headers.insert(header::USER_AGENT, HeaderValue::from_static(HDR_USER_AGENT));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(opts.timeout())
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str) -> Result<Page> {
        let network = |e: reqwest::Error| Error::Network { url: s!(url), reason: e.to_string() };
        let resp = self.client.get(url).send().map_err(network)?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(network)?;
        logd!(url, status, bytes = body.len(), "GET");
        Ok(Page { status, body })
    }
}

/// Canned pages by URL, with a per-URL queue for scripted sequences
/// (throttle page first, then the real one). Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct MemoryFetch {
    pages: Mutex<HashMap<String, VecDeque<Page>>>,
    log: Mutex<Vec<String>>,
}

impl MemoryFetch {
    pub fn new() -> Self { Self::default() }

    /// Serve `body` for `url`. Repeated calls queue responses; the last one sticks.
    pub fn page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.respond(url, Page::ok(body))
    }

    pub fn respond(self, url: impl Into<String>, page: Page) -> Self {
        if let Ok(mut pages) = self.pages.lock() {
            pages.entry(url.into()).or_default().push_back(page);
        }
        self
    }

    /// Every URL requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.log.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Fetch for MemoryFetch {
    fn get(&self, url: &str) -> Result<Page> {
        if let Ok(mut log) = self.log.lock() {
            log.push(s!(url));
        }
        let mut pages = self
            .pages
            .lock()
            .map_err(|_| Error::Network { url: s!(url), reason: s!("fetch state poisoned") })?;
        let page = match pages.get_mut(url) {
            Some(q) if q.len() > 1 => q.pop_front(),
            Some(q) => q.front().cloned(),
            None => None,
        };
        Ok(page.unwrap_or(Page { status: 404, body: s!("<title>Not Found</title>") }))
    }
}
