// src/core/retry.rs
//
// Per-request retry state machine:
//
//   Idle → Requesting ─┬─ marker in <title> ──→ Throttled ─(cooldown)→ Requesting
//                      ├─ transient failure ──→ (backoff) ───────────→ Requesting
//                      └─ page ───────────────→ Done
//
// Throttle cooldowns and network backoff are separate budgets: a flaky connection
// never earns a 60 s wait, and a permanently throttled client fails after
// `max_throttles` cooldowns instead of spinning forever.

use std::cell::Cell;
use std::time::Duration;

use super::clock::{Cancel, Sleeper};
use super::html;
use super::net::Fetch;
use crate::config::consts::RATE_LIMIT_MARKER;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub cooldown: Duration,
    pub max_throttles: u32,
    pub network_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        crate::config::CrawlOptions::default().retry_policy()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Requesting,
    Throttled,
    Done(String),
}

/// Counters for one issuer run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestStats {
    pub requests: u32,
    pub throttles: u32,
    pub network_retries: u32,
    /// Total cooldown slept after throttle pages.
    pub cooldown: Duration,
}

/// True when the page is EDGAR's throttle response.
pub fn is_throttled(body: &str) -> bool {
    html::title(body).is_some_and(|t| t.contains(RATE_LIMIT_MARKER))
}

/// Issues GETs for one issuer run. Not shared between runs.
pub struct Requester<'a> {
    fetch: &'a dyn Fetch,
    sleeper: &'a dyn Sleeper,
    cancel: &'a Cancel,
    policy: RetryPolicy,
    stats: Cell<RequestStats>,
}

impl<'a> Requester<'a> {
    pub fn new(fetch: &'a dyn Fetch, sleeper: &'a dyn Sleeper, cancel: &'a Cancel, policy: RetryPolicy) -> Self {
        Self { fetch, sleeper, cancel, policy, stats: Cell::new(RequestStats::default()) }
    }

    pub fn stats(&self) -> RequestStats { self.stats.get() }

    pub fn sleeper(&self) -> &'a dyn Sleeper { self.sleeper }

    pub fn cancel(&self) -> &'a Cancel { self.cancel }

    fn bump(&self, f: impl FnOnce(&mut RequestStats)) {
        let mut s = self.stats.get();
        f(&mut s);
        self.stats.set(s);
    }

    /// GET `url` until a non-throttled page arrives, returning its body.
    pub fn get(&self, url: &str) -> Result<String> {
        let mut state = RequestState::Idle;
        let mut throttles = 0u32;
        let mut failures = 0u32;

        loop {
            state = match state {
                RequestState::Idle => RequestState::Requesting,

                RequestState::Requesting => {
                    self.cancel.check()?;
                    self.bump(|s| s.requests += 1);
                    let outcome = self.fetch.get(url).and_then(|page| {
                        if is_throttled(&page.body) {
                            Ok(None)
                        } else if page.is_success() {
                            Ok(Some(page.body))
                        } else {
                            Err(Error::Http { status: page.status, url: s!(url) })
                        }
                    });
                    match outcome {
                        Ok(None) => RequestState::Throttled,
                        Ok(Some(body)) => RequestState::Done(body),
                        Err(e) if e.is_transient() && failures < self.policy.network_retries => {
                            failures += 1;
                            self.bump(|s| s.network_retries += 1);
                            let wait = self.backoff(failures);
                            logw!("{e}; retry {failures}/{} in {:?}", self.policy.network_retries, wait);
                            self.sleeper.sleep(wait, self.cancel)?;
                            RequestState::Requesting
                        }
                        Err(e) => return Err(e),
                    }
                }

                RequestState::Throttled => {
                    if throttles >= self.policy.max_throttles {
                        return Err(Error::ThrottleLimit { url: s!(url), attempts: throttles });
                    }
                    throttles += 1;
                    let cooldown = self.policy.cooldown;
                    self.bump(|s| {
                        s.throttles += 1;
                        s.cooldown += cooldown;
                    });
                    logw!(
                        "Request Rate Threshold Exceeded. Retrying in {} s",
                        self.policy.cooldown.as_secs()
                    );
                    self.sleeper.sleep(self.policy.cooldown, self.cancel)?;
                    RequestState::Requesting
                }

                RequestState::Done(body) => return Ok(body),
            };
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.policy.backoff_base.saturating_mul(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::RecordingSleeper;
    use crate::core::net::Page;
    use std::sync::Mutex;

    const THROTTLE_PAGE: &str =
        "<html><head><title>SEC.gov | Request Rate Threshold Exceeded</title></head><body></body></html>";

    /// Replays a fixed script of responses and records requested URLs.
    struct Script {
        replies: Mutex<Vec<Result<Page>>>,
        urls: Mutex<Vec<String>>,
    }

    impl Script {
        fn new(mut replies: Vec<Result<Page>>) -> Self {
            replies.reverse();
            Self { replies: Mutex::new(replies), urls: Mutex::new(Vec::new()) }
        }
    }

    impl Fetch for Script {
        fn get(&self, url: &str) -> Result<Page> {
            self.urls.lock().unwrap().push(url.to_string());
            self.replies.lock().unwrap().pop().unwrap_or_else(|| Ok(Page::ok("<title>ok</title>")))
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            cooldown: Duration::from_secs(60),
            max_throttles: 2,
            network_retries: 2,
            backoff_base: Duration::from_millis(100),
        }
    }

    fn net_err() -> Result<Page> {
        Err(Error::Network { url: s!("u"), reason: s!("reset") })
    }

    #[test]
    fn throttle_sleeps_cooldown_and_repeats_same_url() {
        let fetch = Script::new(vec![
            Ok(Page { status: 403, body: s!(THROTTLE_PAGE) }),
            Ok(Page::ok("<title>listing</title>")),
        ]);
        let sleeper = RecordingSleeper::new();
        let cancel = Cancel::new();
        let req = Requester::new(&fetch, &sleeper, &cancel, policy());

        let body = req.get("https://x/a/").unwrap();
        assert!(body.contains("listing"));
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(60)]);
        assert_eq!(*fetch.urls.lock().unwrap(), vec!["https://x/a/", "https://x/a/"]);
        assert_eq!(req.stats().throttles, 1);
        assert_eq!(req.stats().requests, 2);
        assert_eq!(req.stats().cooldown, Duration::from_secs(60));
    }

    #[test]
    fn throttle_ceiling_is_fatal() {
        let fetch = Script::new(vec![
            Ok(Page::ok(THROTTLE_PAGE)),
            Ok(Page::ok(THROTTLE_PAGE)),
            Ok(Page::ok(THROTTLE_PAGE)),
        ]);
        let sleeper = RecordingSleeper::new();
        let cancel = Cancel::new();
        let req = Requester::new(&fetch, &sleeper, &cancel, policy());

        let err = req.get("https://x/b/").unwrap_err();
        assert!(matches!(err, Error::ThrottleLimit { attempts: 2, .. }));
        assert_eq!(sleeper.slept().len(), 2);
    }

    #[test]
    fn network_failures_use_backoff_not_cooldown() {
        let fetch = Script::new(vec![net_err(), net_err(), Ok(Page::ok("<title>ok</title>"))]);
        let sleeper = RecordingSleeper::new();
        let cancel = Cancel::new();
        let req = Requester::new(&fetch, &sleeper, &cancel, policy());

        req.get("https://x/c/").unwrap();
        assert_eq!(sleeper.slept(), vec![Duration::from_millis(100), Duration::from_millis(200)]);
        assert_eq!(req.stats().throttles, 0);
    }

    #[test]
    fn network_retries_exhausted() {
        let fetch = Script::new(vec![net_err(), net_err(), net_err()]);
        let sleeper = RecordingSleeper::new();
        let cancel = Cancel::new();
        let req = Requester::new(&fetch, &sleeper, &cancel, policy());

        assert!(matches!(req.get("https://x/d/"), Err(Error::Network { .. })));
        assert_eq!(req.stats().requests, 3);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let fetch = Script::new(vec![Ok(Page { status: 404, body: s!("<title>Not Found</title>") })]);
        let sleeper = RecordingSleeper::new();
        let cancel = Cancel::new();
        let req = Requester::new(&fetch, &sleeper, &cancel, policy());

        assert!(matches!(req.get("https://x/e/"), Err(Error::Http { status: 404, .. })));
        assert!(sleeper.slept().is_empty());
    }

    #[test]
    fn cancelled_before_request() {
        let fetch = Script::new(vec![]);
        let sleeper = RecordingSleeper::new();
        let cancel = Cancel::new();
        cancel.cancel();
        let req = Requester::new(&fetch, &sleeper, &cancel, policy());

        assert!(matches!(req.get("https://x/f/"), Err(Error::Cancelled)));
        assert!(fetch.urls.lock().unwrap().is_empty());
    }
}
