use crate::rate_limit::RateLimiter;
use crate::tracker::Tracker;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<Mutex<Tracker>>,
    pub limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub fn new(tracker: Tracker, limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
            limiter,
        }
    }
}
