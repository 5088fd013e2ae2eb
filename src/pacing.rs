// src/pacing.rs
//
// Adaptive inter-request delay. Each completed fetch cycle reports its wall-clock
// duration; when recent durations get erratic (variance above `upper`) the delay
// grows by a second, when they settle (below `lower`) it shrinks back toward zero.
// Throttle cooldowns are handled by `core::retry` and never reach `observe`.

use std::collections::VecDeque;
use std::time::Duration;

use crate::config::PacingOptions;
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct RateController {
    upper: f64,
    lower: f64,
    cap: usize,
    delay: u64,
    window: VecDeque<f64>,
}

impl RateController {
    pub fn new(opts: &PacingOptions) -> Result<Self> {
        opts.validate()?;
        let mut rc = Self {
            upper: opts.variance_upper,
            lower: opts.variance_lower,
            cap: opts.window,
            delay: 0,
            window: VecDeque::with_capacity(opts.window + 1),
        };
        rc.reset();
        Ok(rc)
    }

    /// Back to delay 0 with the window seeded by a single zero.
    pub fn reset(&mut self) {
        self.delay = 0;
        self.window.clear();
        self.window.push_back(0.0);
    }

    /// Record one cycle and return the new delay in whole seconds.
    pub fn observe(&mut self, cycle: Duration) -> u64 {
        self.window.push_back(cycle.as_secs_f64());
        while self.window.len() > self.cap {
            self.window.pop_front();
        }

        let var = self.variance();
        if var > self.upper {
            self.delay += 1;
        } else if var < self.lower && self.delay > 0 {
            self.delay -= 1;
        }
        logd!(variance = var, delay = self.delay, "pacing");
        self.delay
    }

    pub fn current_delay(&self) -> Duration {
        Duration::from_secs(self.delay)
    }

    pub fn delay_secs(&self) -> u64 { self.delay }

    /// Sample variance (n-1) of the window; zero for fewer than two entries.
    pub fn variance(&self) -> f64 {
        let n = self.window.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.window.iter().sum::<f64>() / n as f64;
        self.window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rc() -> RateController {
        RateController::new(&PacingOptions::default()).unwrap()
    }

    fn secs(s: f64) -> Duration { Duration::from_secs_f64(s) }

    #[test]
    fn starts_idle() {
        let r = rc();
        assert_eq!(r.current_delay(), Duration::ZERO);
        assert_eq!(r.variance(), 0.0);
    }

    #[test]
    fn steady_cycles_never_add_delay() {
        let mut r = rc();
        for _ in 0..10 {
            r.observe(secs(0.3));
        }
        assert_eq!(r.delay_secs(), 0);
    }

    #[test]
    fn erratic_cycles_grow_delay() {
        let mut r = rc();
        // window [0, 2] → var 2.0
        assert_eq!(r.observe(secs(2.0)), 1);
        // [0, 2, 0.1] → var ≈ 1.27
        assert_eq!(r.observe(secs(0.1)), 2);
        // [2, 0.1, 3] → still erratic
        assert_eq!(r.observe(secs(3.0)), 3);
    }

    #[test]
    fn calm_cycles_decay_to_zero_and_stay() {
        let mut r = rc();
        r.observe(secs(2.0));
        r.observe(secs(0.1));
        assert_eq!(r.delay_secs(), 2);
        // the first calm cycle still shares the window with the spike
        let delays: Vec<u64> = (0..8).map(|_| r.observe(secs(0.5))).collect();
        assert!(delays[1..].windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(*delays.last().unwrap(), 0);
    }

    #[test]
    fn dead_band_holds_delay() {
        let opts = PacingOptions { variance_upper: 0.5, variance_lower: 0.0, window: 3 };
        let mut r = RateController::new(&opts).unwrap();
        r.observe(secs(2.0));
        r.observe(secs(1.0));
        r.observe(secs(1.0));
        let held = r.delay_secs();
        assert!(held > 0);
        // variance 0 is not below 0
        for _ in 0..5 {
            r.observe(secs(1.0));
        }
        assert_eq!(r.delay_secs(), held);
    }

    #[test]
    fn reset_restores_seed() {
        let mut r = rc();
        r.observe(secs(5.0));
        r.reset();
        assert_eq!(r.delay_secs(), 0);
        assert_eq!(r.variance(), 0.0);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let opts = PacingOptions { variance_upper: 0.1, variance_lower: 0.4, window: 3 };
        assert!(RateController::new(&opts).is_err());
    }
}
