//! Windowed transfer-rate estimate.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Bytes/second over roughly the last `window`, computed from
/// `(instant, cumulative bytes)` samples.
#[derive(Debug)]
pub struct RateMeter {
    window: Duration,
    samples: VecDeque<(Instant, u64)>,
}

impl RateMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Record that `loaded` bytes have arrived in total as of `now` and
    /// return the current estimate. Returns 0 until two samples are apart
    /// in time.
    pub fn record(&mut self, now: Instant, loaded: u64) -> f64 {
        self.samples.push_back((now, loaded));
        // Keep the newest sample that is at least a window old as the baseline.
        while self.samples.len() > 1
            && now.duration_since(self.samples[1].0) >= self.window
        {
            self.samples.pop_front();
        }
        let Some(&(start, start_loaded)) = self.samples.front() else {
            return 0.0;
        };
        let elapsed = now.duration_since(start).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        loaded.saturating_sub(start_loaded) as f64 / elapsed
    }
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_sample_has_no_rate() {
        let mut meter = RateMeter::default();
        assert_eq!(meter.record(Instant::now(), 4096), 0.0);
    }

    #[test]
    fn steady_transfer() {
        let t0 = Instant::now();
        let mut meter = RateMeter::default();
        meter.record(t0, 0);
        meter.record(t0 + ms(500), 500);
        let rate = meter.record(t0 + ms(1000), 1000);
        assert!((rate - 1000.0).abs() < 1e-6, "{rate}");
    }

    #[test]
    fn old_samples_leave_the_window() {
        let t0 = Instant::now();
        let mut meter = RateMeter::default();
        meter.record(t0, 0);
        meter.record(t0 + ms(500), 100);
        meter.record(t0 + ms(1000), 200);
        // Burst: 3000 bytes in the last two seconds, measured from t0+1s.
        let rate = meter.record(t0 + ms(3000), 3200);
        assert!((rate - 1500.0).abs() < 1e-6, "{rate}");
    }

    #[test]
    fn stall_decays_rate() {
        let t0 = Instant::now();
        let mut meter = RateMeter::default();
        meter.record(t0, 0);
        meter.record(t0 + ms(1000), 1000);
        meter.record(t0 + ms(5000), 1000);
        let rate = meter.record(t0 + ms(6000), 1000);
        assert_eq!(rate, 0.0);
    }
}
