//! Bounded exponential backoff for failed poll ticks.
//!
//! A failed poll leaves the previous job list stale; rather than hammering a
//! struggling server at the fixed interval, consecutive failures stretch the
//! next tick exponentially up to a cap. The first successful poll resets the
//! schedule.

use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub struct PollBackoff {
    base: Duration,
    cap: Duration,
    multiplier: f64,
    add_jitter: bool,
    consecutive_failures: u32,
}

impl PollBackoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            multiplier: 2.0,
            add_jitter: true,
            consecutive_failures: 0,
        }
    }

    #[cfg(test)]
    fn without_jitter(base: Duration, cap: Duration) -> Self {
        Self {
            add_jitter: false,
            ..Self::new(base, cap)
        }
    }

    /// Delay before the next tick after a failed poll.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.consecutive_failures.min(16);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let scaled = self.base.as_millis() as f64 * self.multiplier.powi(exponent as i32);
        let capped = scaled.min(self.cap.as_millis() as f64) as u64;

        let mut delay = Duration::from_millis(capped);
        if self.add_jitter {
            // Up to 25% jitter so stalled clients do not re-poll in lockstep.
            let jitter = (capped as f64 * 0.25 * subsec_jitter()) as u64;
            delay += Duration::from_millis(jitter);
        }
        delay
    }

    /// Delay before the next tick after a successful poll.
    pub fn reset(&mut self) -> Duration {
        self.consecutive_failures = 0;
        self.base
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Pseudo-random 0.0..1.0 without pulling in an RNG dependency.
fn subsec_jitter() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}
