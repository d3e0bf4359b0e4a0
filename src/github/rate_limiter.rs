use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use reqwest::Response;
use tokio::time::{sleep, Duration};

pub struct RateLimiter {
    state: Mutex<RateLimitState>,
    per_minute: u32,
}

struct RateLimitState {
    remaining: u32,
    reset_at: Option<Instant>,
    requests_this_minute: u32,
    minute_start: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_budget(60)
    }

    /// `per_minute` is a soft cap applied on top of the server-reported quota.
    /// Zero disables the soft cap.
    pub fn with_budget(per_minute: u32) -> Self {
        Self {
            state: Mutex::new(RateLimitState {
                remaining: 5000,
                reset_at: None,
                requests_this_minute: 0,
                minute_start: Instant::now(),
            }),
            per_minute,
        }
    }

    pub async fn wait(&self) {
        if let Some(wait) = self.quota_wait() {
            tracing::info!("Rate limited, waiting {:?}", wait);
            sleep(wait).await;
            if let Ok(mut state) = self.state.lock() {
                state.remaining = state.remaining.max(1);
                state.reset_at = None;
            }
        }

        if let Some(wait) = self.soft_wait() {
            tracing::debug!("Soft rate limiting, waiting {:?}", wait);
            sleep(wait).await;
            if let Ok(mut state) = self.state.lock() {
                state.requests_this_minute = 0;
                state.minute_start = Instant::now();
            }
        }

        if let Ok(mut state) = self.state.lock() {
            state.requests_this_minute += 1;
        }
    }

    fn quota_wait(&self) -> Option<Duration> {
        let state = self.state.lock().ok()?;
        if state.remaining > 0 {
            return None;
        }
        let reset_at = state.reset_at?;
        let now = Instant::now();
        (reset_at > now).then(|| reset_at - now)
    }

    fn soft_wait(&self) -> Option<Duration> {
        if self.per_minute == 0 {
            return None;
        }
        let mut state = self.state.lock().ok()?;
        let elapsed = state.minute_start.elapsed();
        if elapsed >= Duration::from_secs(60) {
            state.requests_this_minute = 0;
            state.minute_start = Instant::now();
            return None;
        }
        (state.requests_this_minute >= self.per_minute).then(|| Duration::from_secs(60) - elapsed)
    }

    pub fn update_from_response(&self, response: &Response) {
        let headers = response.headers();
        let remaining = headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        let reset = headers
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        if let Some(remaining) = remaining {
            self.record(remaining, reset);
        }
    }

    /// Records the quota reported by the server; `reset_epoch` is in unix seconds.
    pub fn record(&self, remaining: u32, reset_epoch: Option<u64>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.remaining = remaining;
        state.reset_at = reset_epoch
            .map(seconds_until)
            .filter(|secs| *secs > 0)
            .map(|secs| Instant::now() + Duration::from_secs(secs));
    }

    /// Seconds until the server quota resets, when it is exhausted.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.quota_wait().map(|d| d.as_secs().max(1))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn seconds_until(epoch_secs: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    epoch_secs.saturating_sub(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_quota_reports_retry_after() {
        let limiter = RateLimiter::with_budget(0);
        let reset = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 120;
        limiter.record(0, Some(reset));
        let secs = limiter.retry_after_secs().unwrap();
        assert!(secs > 100 && secs <= 120);
    }

    #[test]
    fn test_remaining_quota_does_not_block() {
        let limiter = RateLimiter::with_budget(0);
        limiter.record(42, Some(0));
        assert!(limiter.retry_after_secs().is_none());
    }

    #[tokio::test]
    async fn test_wait_without_budget_returns_immediately() {
        let limiter = RateLimiter::with_budget(0);
        for _ in 0..100 {
            limiter.wait().await;
        }
    }
}
