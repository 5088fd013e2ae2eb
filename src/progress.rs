// src/progress.rs
/// Lightweight progress reporting for long-running operations (fetch loop, batch).
/// Frontends implement this to surface status to users.
pub trait Progress {
    /// Called at the start with the total number of items.
    fn begin(&mut self, _total: usize) {}

    /// Called when one logical unit completes (a filing fetched, an issuer merged).
    fn item_done(&mut self, _done: usize, _total: usize) {}

    /// Called when one logical unit is given up on.
    fn item_failed(&mut self, _label: &str, _reason: &str) {}

    /// Called at the end, successful or not.
    fn finish(&mut self) {}
}

/// Logs whole-percent steps, each at most once.
#[derive(Debug, Default)]
pub struct LogProgress {
    label: String,
    last_pct: Option<usize>,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), last_pct: None }
    }
}

impl Progress for LogProgress {
    fn begin(&mut self, total: usize) {
        self.last_pct = None;
        logf!("{}| {total} to go", self.label);
    }

    fn item_done(&mut self, done: usize, total: usize) {
        let pct = percent(done, total);
        if self.last_pct.is_none_or(|last| pct > last) {
            self.last_pct = Some(pct);
            logf!("{}| progress: {pct}%", self.label);
        }
    }

    fn item_failed(&mut self, label: &str, reason: &str) {
        loge!("{}| {label}: {reason}", self.label);
    }
}

/// Whole percent, clamped to 100; an empty run counts as done.
pub fn percent(done: usize, total: usize) -> usize {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100) / total
}
