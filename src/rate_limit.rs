use governor::{DefaultKeyedRateLimiter, Quota};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

/// Decides whether a request from `identity` may proceed.
pub trait RateLimiter: Send + Sync {
    fn check(&self, identity: &str) -> bool;

    /// Drops per-identity state that no longer affects any decision.
    fn evict_stale(&self) {}
}

/// Per-identity GCRA quota: a burst of `max_requests`, refilled evenly over
/// `window`.
pub struct QuotaLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl QuotaLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let burst = NonZeroU32::new(u32::try_from(max_requests).unwrap_or(u32::MAX))
            .unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(window / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: DefaultKeyedRateLimiter::keyed(quota),
        }
    }

    /// Number of identities currently tracked.
    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }
}

impl RateLimiter for QuotaLimiter {
    fn check(&self, identity: &str) -> bool {
        match self.limiter.check_key(&identity.to_string()) {
            Ok(()) => true,
            Err(_) => {
                warn!("rate limit exceeded for {identity}");
                false
            }
        }
    }

    fn evict_stale(&self) {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        debug!("rate limiter evicted {} idle identities", before.saturating_sub(self.limiter.len()));
    }
}
