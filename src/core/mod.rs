// src/core/mod.rs

pub mod clock;
pub mod html;
pub mod net;
pub mod retry;
pub mod sanitize;

pub use clock::{Cancel, RecordingSleeper, Sleeper, ThreadSleeper};
pub use net::{Fetch, HttpFetcher, MemoryFetch, Page};
pub use retry::{RequestStats, Requester, RetryPolicy};
