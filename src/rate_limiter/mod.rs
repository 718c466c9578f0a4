//! Per-provider moving-window admission control (§4.1).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimiterError {
    #[error("requests_per_window must be positive, got {0}")]
    NonPositiveWindowSize(u32),
    #[error("window_seconds must be positive, got {0}")]
    NonPositiveWindowSeconds(f64),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimiterStats {
    pub requests_per_window: u32,
    pub window_seconds: f64,
    pub current_window_count: usize,
    pub total_requests: u64,
    pub cumulative_wait_seconds: f64,
}

struct State {
    timestamps: VecDeque<Instant>,
    total_requests: u64,
    cumulative_wait: Duration,
}

/// A small nonzero delay added to a computed wait so the prune at the next
/// acquire always sees the oldest timestamp already outside the window,
/// rather than racing it on floating point rounding.
const EPSILON: Duration = Duration::from_millis(5);

pub struct RateLimiter {
    requests_per_window: u32,
    window: Duration,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(requests_per_window: u32, window_seconds: f64) -> Result<Self, RateLimiterError> {
        if requests_per_window == 0 {
            return Err(RateLimiterError::NonPositiveWindowSize(requests_per_window));
        }
        if window_seconds <= 0.0 {
            return Err(RateLimiterError::NonPositiveWindowSeconds(window_seconds));
        }

        Ok(Self {
            requests_per_window,
            window: Duration::from_secs_f64(window_seconds),
            state: Mutex::new(State {
                timestamps: VecDeque::new(),
                total_requests: 0,
                cumulative_wait: Duration::ZERO,
            }),
        })
    }

    fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&front) = timestamps.front() {
            if now.duration_since(front) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Holds the lock for the full prune-check-(sleep)-readmit sequence so
    /// concurrent callers are served FIFO by `tokio::sync::Mutex`'s queue.
    pub async fn acquire(&self) -> Duration {
        let mut guard = self.state.lock().await;
        let now = Instant::now();
        Self::prune(&mut guard.timestamps, now, self.window);

        if guard.timestamps.len() < self.requests_per_window as usize {
            guard.timestamps.push_back(now);
            guard.total_requests += 1;
            return Duration::ZERO;
        }

        let oldest = *guard.timestamps.front().expect("non-empty: at capacity");
        let wait = (oldest + self.window).saturating_duration_since(now) + EPSILON;
        guard.cumulative_wait += wait;
        drop(guard);

        sleep(wait).await;

        let mut guard = self.state.lock().await;
        let now = Instant::now();
        Self::prune(&mut guard.timestamps, now, self.window);
        guard.timestamps.push_back(now);
        guard.total_requests += 1;

        wait
    }

    /// No-op, kept for symmetry with callers that abort after acquiring.
    pub fn release(&self) {}

    pub async fn stats(&self) -> RateLimiterStats {
        let guard = self.state.lock().await;
        RateLimiterStats {
            requests_per_window: self.requests_per_window,
            window_seconds: self.window.as_secs_f64(),
            current_window_count: guard.timestamps.len(),
            total_requests: guard.total_requests,
            cumulative_wait_seconds: guard.cumulative_wait.as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_config() {
        assert!(matches!(
            RateLimiter::new(0, 1.0),
            Err(RateLimiterError::NonPositiveWindowSize(0))
        ));
        assert!(matches!(
            RateLimiter::new(5, 0.0),
            Err(RateLimiterError::NonPositiveWindowSeconds(_))
        ));
    }

    #[tokio::test]
    async fn admits_up_to_limit_without_waiting() {
        let limiter = RateLimiter::new(3, 60.0).unwrap();
        for _ in 0..3 {
            let wait = limiter.acquire().await;
            assert_eq!(wait, Duration::ZERO);
        }
        let stats = limiter.stats().await;
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.current_window_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn blocks_until_window_frees_a_slot() {
        let limiter = RateLimiter::new(1, 1.0).unwrap();
        let first_wait = limiter.acquire().await;
        assert_eq!(first_wait, Duration::ZERO);

        let second_wait = limiter.acquire().await;
        assert!(second_wait > Duration::ZERO);
        assert!(second_wait <= Duration::from_secs(1) + EPSILON);
    }
}
