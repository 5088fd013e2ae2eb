// src/core/clock.rs
//
// The only places a run blocks on purpose (throttle cooldown, network backoff,
// adaptive delay) go through a `Sleeper`, which also honours cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// Cooperative cancellation flag, cheap to clone across workers.
#[derive(Clone, Debug, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }

    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }

    /// `Err(Cancelled)` once cancelled; call before every network request.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() { Err(Error::Cancelled) } else { Ok(()) }
    }
}

pub trait Sleeper: Send + Sync {
    /// Block for `dur` unless cancelled first.
    fn sleep(&self, dur: Duration, cancel: &Cancel) -> Result<()>;
}

impl<S: Sleeper + ?Sized> Sleeper for Arc<S> {
    fn sleep(&self, dur: Duration, cancel: &Cancel) -> Result<()> {
        (**self).sleep(dur, cancel)
    }
}

/// Real sleeps, sliced so cancellation is noticed within `SLICE`.
pub struct ThreadSleeper;

impl ThreadSleeper {
    const SLICE: Duration = Duration::from_millis(250);
}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, dur: Duration, cancel: &Cancel) -> Result<()> {
        let mut left = dur;
        while !left.is_zero() {
            cancel.check()?;
            let step = left.min(Self::SLICE);
            thread::sleep(step);
            left -= step;
        }
        cancel.check()
    }
}

/// Records requested sleeps instead of blocking. For tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self { Self::default() }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, dur: Duration, cancel: &Cancel) -> Result<()> {
        cancel.check()?;
        if let Ok(mut v) = self.slept.lock() {
            v.push(dur);
        }
        Ok(())
    }
}
