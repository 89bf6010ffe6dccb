//! Client-side throttling of provider requests.
//!
//! [`RateLimiter`] keeps a rolling one-hour window of request counts and a
//! minimum gap between consecutive requests. It is shared by every task that
//! issues requests; each call to [`RateLimiter::wait_for_next_request`]
//! reserves the next free slot under a short lock and then sleeps until that
//! slot outside the lock, so concurrent callers queue up behind each other.
//!
//! State lives in memory only. A restarted process starts from zero and does
//! not know how much of the provider's quota is already spent this hour.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

/// Length of the rolling accounting window.
pub const WINDOW: Duration = Duration::from_millis(3_600_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests_per_hour: u32,
    pub min_delay: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_hour: 5000,
            min_delay: Duration::from_millis(100),
        }
    }
}

/// Snapshot of the limiter counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub request_count: u32,
    pub max_requests: u32,
    pub window_start: Instant,
    pub time_until_reset: Duration,
}

#[derive(Debug)]
struct RateLimiterState {
    request_count: u32,
    window_start: Instant,
    last_request_time: Option<Instant>,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<RateLimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RateLimiterState {
                request_count: 0,
                window_start: Instant::now(),
                last_request_time: None,
            }),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Suspends the calling task until one more request may be issued, then
    /// counts that request.
    pub async fn wait_for_next_request(&self) {
        let slot = self.reserve_slot(Instant::now());
        if slot > Instant::now() {
            debug!(
                wait_ms = slot.saturating_duration_since(Instant::now()).as_millis() as u64,
                "[RATE] Delaying request"
            );
            sleep_until(slot).await;
        }
    }

    /// Current counters. Does not change any state.
    pub fn status(&self) -> RateLimitStatus {
        let state = self.lock();
        let elapsed = Instant::now().saturating_duration_since(state.window_start);
        RateLimitStatus {
            request_count: state.request_count,
            max_requests: self.config.max_requests_per_hour,
            window_start: state.window_start,
            time_until_reset: WINDOW.saturating_sub(elapsed),
        }
    }

    /// Picks the instant at which the next request may start and records it
    /// as issued at that instant.
    fn reserve_slot(&self, now: Instant) -> Instant {
        let mut state = self.lock();

        if now.saturating_duration_since(state.window_start) >= WINDOW {
            state.request_count = 0;
            state.window_start = now;
        }

        let mut slot = now;

        if state.request_count >= self.config.max_requests_per_hour {
            let window_end = state.window_start + WINDOW;
            warn!(
                request_count = state.request_count,
                max_requests = self.config.max_requests_per_hour,
                wait_secs = window_end.saturating_duration_since(now).as_secs_f64().ceil() as u64,
                "[RATE] Hourly request budget spent, waiting for the window to reset"
            );
            slot = slot.max(window_end);
            state.request_count = 0;
            state.window_start = slot;
        }

        if let Some(last) = state.last_request_time {
            slot = slot.max(last + self.config.min_delay);
        }

        state.last_request_time = Some(slot);
        state.request_count += 1;
        slot
    }

    fn lock(&self) -> MutexGuard<'_, RateLimiterState> {
        // Counters stay consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
