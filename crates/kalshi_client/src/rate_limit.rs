//! Read rate limiter for the Kalshi API.
//!
//! Basic tier allows 20 reads/sec.

use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter =
    GovLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    read_limiter: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Create with Kalshi basic-tier limits.
    pub fn new() -> Self {
        Self::with_reads_per_sec(20)
    }

    /// Create with a custom per-second read limit. Zero is treated as one.
    pub fn with_reads_per_sec(reads_per_sec: u32) -> Self {
        let per_sec = NonZeroU32::new(reads_per_sec).unwrap_or(NonZeroU32::MIN);
        Self {
            read_limiter: Arc::new(GovLimiter::direct(Quota::per_second(per_sec))),
        }
    }

    /// Wait until a read slot is available.
    pub async fn wait_read(&self) {
        self.read_limiter.until_ready().await;
    }

    /// Try to acquire a read slot without waiting. Returns true if acquired.
    pub fn try_read(&self) -> bool {
        self.read_limiter.check().is_ok()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_is_bounded() {
        let limiter = RateLimiter::with_reads_per_sec(2);
        assert!(limiter.try_read());
        assert!(limiter.try_read());
        assert!(!limiter.try_read());
    }

    #[test]
    fn test_zero_quota_still_allows_reads() {
        let limiter = RateLimiter::with_reads_per_sec(0);
        assert!(limiter.try_read());
    }
}
