use std::time::{Duration, Instant};

use dashmap::DashMap;

const MAX_FAILURES: u32 = 5;
const WINDOW: Duration = Duration::from_secs(15 * 60);

/// Per-email brute force limiter for the sign-in endpoint.
pub struct LoginRateLimiter {
    /// email -> (failed_count, window_start)
    entries: DashMap<String, (u32, Instant)>,
    max_failures: u32,
    window: Duration,
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(MAX_FAILURES, WINDOW)
    }
}

impl LoginRateLimiter {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_failures,
            window,
        }
    }

    /// Whether another attempt is allowed. Does not count the attempt; call
    /// `record_failure()` when the credentials turn out to be wrong.
    /// Returns the seconds until the window reopens when blocked.
    pub fn check(&self, email: &str) -> Result<(), u64> {
        let now = Instant::now();
        let Some(entry) = self.entries.get(&email.to_lowercase()) else {
            return Ok(());
        };
        let (count, start) = *entry.value();

        if now.duration_since(start) > self.window {
            return Ok(());
        }
        if count >= self.max_failures {
            let elapsed = now.duration_since(start).as_secs();
            return Err(self.window.as_secs().saturating_sub(elapsed));
        }
        Ok(())
    }

    pub fn record_failure(&self, email: &str) {
        let now = Instant::now();
        let mut entry = self.entries.entry(email.to_lowercase()).or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) > self.window {
            *count = 1;
            *start = now;
        } else {
            *count += 1;
        }
    }

    /// Forget past failures after a successful sign-in.
    pub fn reset(&self, email: &str) {
        self.entries.remove(&email.to_lowercase());
    }

    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.window;
        self.entries
            .retain(|_, (_, start)| now.duration_since(*start) < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_max_failures() {
        let limiter = LoginRateLimiter::default();
        for _ in 0..4 {
            limiter.record_failure("kim@agency.test");
            assert!(limiter.check("kim@agency.test").is_ok());
        }
        limiter.record_failure("KIM@agency.test");
        let retry_after = limiter.check("kim@agency.test").unwrap_err();
        assert!(retry_after > 0 && retry_after <= 15 * 60);
        assert!(limiter.check("other@agency.test").is_ok());
    }

    #[test]
    fn reset_clears_failures() {
        let limiter = LoginRateLimiter::new(1, WINDOW);
        limiter.record_failure("kim@agency.test");
        assert!(limiter.check("kim@agency.test").is_err());
        limiter.reset("kim@agency.test");
        assert!(limiter.check("kim@agency.test").is_ok());
    }

    #[test]
    fn expired_window_allows_again() {
        let limiter = LoginRateLimiter::new(1, Duration::ZERO);
        limiter.record_failure("kim@agency.test");
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.check("kim@agency.test").is_ok());
        limiter.cleanup();
        assert!(limiter.entries.is_empty());
    }
}
