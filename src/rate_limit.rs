use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::token_bucket::TokenBucket;

/// Buckets idle longer than this many windows are dropped by the
/// background sweep.
const IDLE_WINDOWS: u32 = 3;

/// Per-client-IP rate limiter. One token bucket per resolved IP, created on
/// first sighting. The map is bounded: when `max_tracked` distinct IPs are
/// tracked, the longest-idle bucket is evicted to make room, and a periodic
/// sweep drops buckets that have gone quiet.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    requests: u32,
    window: Duration,
    max_tracked: usize,
}

impl RateLimiter {
    pub fn new(requests: u32, window: Duration, max_tracked: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            requests,
            window,
            max_tracked,
        }
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record one request from `ip`. Returns true when it is within the
    /// limit, false when the client's bucket is exhausted.
    pub fn check(&self, ip: &str) -> Result<bool> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| Error::Internal("rate limiter lock poisoned".to_string()))?;

        if !buckets.contains_key(ip) && buckets.len() >= self.max_tracked {
            evict_stalest(&mut buckets);
        }

        let refill_rate = self.requests as f64 / self.window.as_secs_f64();
        let bucket = buckets
            .entry(ip.to_string())
            .or_insert_with(|| TokenBucket::new(self.requests, refill_rate));

        Ok(bucket.try_consume())
    }

    /// Drop buckets that have been idle for several windows. Run
    /// periodically so one-off clients do not accumulate forever.
    pub fn evict_idle(&self) -> Result<usize> {
        let max_idle = self.window * IDLE_WINDOWS;

        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| Error::Internal("rate limiter lock poisoned".to_string()))?;

        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.idle_for() < max_idle);
        Ok(before - buckets.len())
    }

    pub fn tracked_ips(&self) -> usize {
        self.buckets.lock().map(|b| b.len()).unwrap_or(0)
    }
}

fn evict_stalest(buckets: &mut HashMap<String, TokenBucket>) {
    if let Some(key) = buckets
        .iter()
        .max_by_key(|(_, bucket)| bucket.idle_for())
        .map(|(key, _)| key.clone())
    {
        buckets.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_third_request_within_window_denied() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1), 100);

        assert!(limiter.check("1.2.3.4").unwrap());
        assert!(limiter.check("1.2.3.4").unwrap());
        assert!(!limiter.check("1.2.3.4").unwrap());
    }

    #[test]
    fn test_refill_allows_after_wait() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1), 100);

        assert!(limiter.check("1.2.3.4").unwrap());
        assert!(limiter.check("1.2.3.4").unwrap());
        assert!(!limiter.check("1.2.3.4").unwrap());

        // 2 tokens/sec: after ~0.55s one token is back
        thread::sleep(Duration::from_millis(550));
        assert!(limiter.check("1.2.3.4").unwrap());
    }

    #[test]
    fn test_ips_limited_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60), 100);

        assert!(limiter.check("1.2.3.4").unwrap());
        assert!(!limiter.check("1.2.3.4").unwrap());
        assert!(limiter.check("5.6.7.8").unwrap());
    }

    #[test]
    fn test_map_bounded_by_max_tracked() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60), 3);

        for i in 0..10 {
            limiter.check(&format!("10.0.0.{}", i)).unwrap();
        }

        assert!(limiter.tracked_ips() <= 3);
    }

    #[test]
    fn test_evict_idle_drops_quiet_buckets() {
        let limiter = RateLimiter::new(10, Duration::from_millis(10), 100);

        limiter.check("1.2.3.4").unwrap();
        thread::sleep(Duration::from_millis(50));

        let evicted = limiter.evict_idle().unwrap();
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_ips(), 0);
    }
}
