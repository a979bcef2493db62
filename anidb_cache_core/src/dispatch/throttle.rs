//! Send pacing and timeout backoff

use crate::config::DispatchConfig;
use log::{debug, trace};
use std::time::Duration;
use tokio::time::{Instant, sleep};

const GROWTH: f64 = 1.1;
const DECAY: f64 = 0.9;
const DECAY_INTERVAL: Duration = Duration::from_secs(10);

/// Adaptive gap between two sends
///
/// Every send stretches the gap, every ten idle seconds shrink it again; the
/// gap always stays within `[min, max]`. The first send goes out immediately.
#[derive(Debug)]
pub struct Throttle {
    min: Duration,
    max: Duration,
    current: Duration,
    last_send: Option<Instant>,
}

impl Throttle {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            current: min,
            last_send: None,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.min_interval(), config.max_interval())
    }

    /// The gap currently enforced after the last send
    pub fn interval(&self) -> Duration {
        self.current
    }

    /// Sleeps until the next send is allowed
    pub async fn wait(&self) {
        let Some(last) = self.last_send else {
            trace!("Throttle: first send, proceeding immediately");
            return;
        };
        let elapsed = last.elapsed();
        if elapsed < self.current {
            let wait_time = self.current - elapsed;
            debug!("Throttle: waiting {wait_time:?} before next send");
            sleep(wait_time).await;
        } else {
            trace!("Throttle: {elapsed:?} since last send, no wait needed");
        }
    }

    /// Records a send happening now
    pub fn sent(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_send {
            self.decay(now.saturating_duration_since(last));
        }
        self.current = self.current.mul_f64(GROWTH).min(self.max);
        self.last_send = Some(now);
        trace!("Throttle: interval now {:?}", self.current);
    }

    fn decay(&mut self, idle: Duration) {
        let steps = idle.as_secs() / DECAY_INTERVAL.as_secs();
        for _ in 0..steps {
            if self.current <= self.min {
                break;
            }
            self.current = self.current.mul_f64(DECAY).max(self.min);
        }
    }
}

/// Capped exponential backoff between timeout retries
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    factor: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            initial,
            max,
            factor,
            current: initial,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(
            config.initial_backoff(),
            config.max_backoff(),
            config.backoff_factor,
        )
    }

    /// Grows the delay and returns it; never exceeds the ceiling
    pub fn next(&mut self) -> Duration {
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.factor)
            .map_or(self.max, |grown| grown.min(self.max));
        self.current
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Back to the initial delay, after any reply
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_send_is_immediate() {
        let throttle = Throttle::new(secs(2.0), secs(4.0));
        let start = Instant::now();
        throttle.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_grows_to_max() {
        let mut throttle = Throttle::new(secs(2.0), secs(4.0));
        throttle.sent();
        assert_eq!(throttle.interval(), secs(2.0).mul_f64(1.1));

        let start = Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() >= throttle.interval());

        for _ in 0..20 {
            throttle.wait().await;
            throttle.sent();
        }
        assert_eq!(throttle.interval(), secs(4.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_decays_to_min() {
        let mut throttle = Throttle::new(secs(2.0), secs(4.0));
        for _ in 0..20 {
            throttle.wait().await;
            throttle.sent();
        }
        assert_eq!(throttle.interval(), secs(4.0));

        tokio::time::advance(Duration::from_secs(10 * 60)).await;
        throttle.sent();
        assert_eq!(throttle.interval(), secs(2.0).mul_f64(1.1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_long_idle() {
        let mut throttle = Throttle::new(secs(2.0), secs(4.0));
        throttle.sent();
        tokio::time::advance(Duration::from_secs(5)).await;
        let start = Instant::now();
        throttle.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_backoff_sequence() {
        let mut backoff = Backoff::new(secs(6.0), secs(60.0), 1.5);
        assert_eq!(backoff.next(), secs(9.0));
        assert_eq!(backoff.next(), secs(13.5));
        for _ in 0..10 {
            backoff.next();
        }
        assert_eq!(backoff.current(), secs(60.0));
        backoff.reset();
        assert_eq!(backoff.current(), secs(6.0));
    }

    #[test]
    fn test_backoff_saturates_on_huge_factor() {
        let mut backoff = Backoff::new(secs(6.0), secs(60.0), f64::MAX);
        assert_eq!(backoff.next(), secs(60.0));
        assert_eq!(backoff.next(), secs(60.0));
    }

    proptest! {
        #[test]
        fn backoff_is_monotonic_and_capped(
            initial_ms in 1u64..10_000,
            extra_ms in 0u64..100_000,
            factor in 1.0f64..4.0,
            steps in 1usize..40,
        ) {
            let max = Duration::from_millis(initial_ms + extra_ms);
            let mut backoff = Backoff::new(Duration::from_millis(initial_ms), max, factor);
            let mut previous = backoff.current();
            for _ in 0..steps {
                let delay = backoff.next();
                prop_assert!(delay >= previous);
                prop_assert!(delay <= max);
                previous = delay;
            }
        }
    }
}
