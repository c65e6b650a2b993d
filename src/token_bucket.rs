use std::time::{Duration, Instant};

/// Token bucket backing a single client's rate limit: bursts up to
/// `capacity`, refilling continuously at `refill_rate` tokens per second.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: u32,
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            tokens: capacity as f64,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    /// Take one token if available. Returns false when the bucket is empty.
    pub fn try_consume(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn available_tokens(&mut self) -> u32 {
        self.refill();
        self.tokens.floor() as u32
    }

    /// How long this bucket has gone without a refill tick; used by the
    /// limiter to evict idle entries.
    pub fn idle_for(&self) -> Duration {
        self.last_refill.elapsed()
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);

        let tokens_to_add = self.refill_rate * elapsed.as_secs_f64();
        // Cap at capacity so idle periods never bank extra burst.
        self.tokens = (self.tokens + tokens_to_add).min(self.capacity as f64);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_consumes_up_to_capacity() {
        let mut bucket = TokenBucket::new(3, 0.0);
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
    }

    #[test]
    fn test_refills_over_time() {
        // 2 requests per second
        let mut bucket = TokenBucket::new(2, 2.0);
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());

        thread::sleep(Duration::from_millis(550));

        // ~1.1 tokens refilled
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
    }

    #[test]
    fn test_refill_capped_at_capacity() {
        let mut bucket = TokenBucket::new(5, 1000.0);
        assert!(bucket.try_consume());

        thread::sleep(Duration::from_millis(20));

        assert_eq!(bucket.available_tokens(), 5);
    }
}
