//! Requests-per-second limiter shared by every caller of a client.

use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;
use std::time::Duration;

/// Unkeyed GCRA limiter with a burst of one, so permits are spaced evenly at
/// `1 / rate` intervals instead of being released in bursts.
pub struct RateLimiter {
    limiter: DefaultDirectRateLimiter,
    interval: Duration,
}

impl RateLimiter {
    /// Create a limiter allowing `per_second` permits per second (minimum 1).
    pub fn new(per_second: u32) -> Self {
        let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rate).allow_burst(NonZeroU32::MIN);
        Self {
            limiter: governor::RateLimiter::direct(quota),
            interval: Duration::from_secs(1) / rate.get(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next permit is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}
