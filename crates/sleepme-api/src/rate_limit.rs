// Sliding-window request governor.
//
// The limiter never blocks or queues. It only answers whether another
// request fits in the trailing window, recording the slot when it does.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Default number of requests allowed per window.
pub const DEFAULT_MAX_REQUESTS: usize = 10;

/// Default trailing window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// What the client does when the limiter reports no capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum RateLimitPolicy {
    /// Log a warning and send the request anyway.
    #[default]
    Advisory,
    /// Fail the call locally with [`Error::RateLimited`](crate::Error::RateLimited)
    /// without touching the network.
    Enforce,
}

/// Tracks recent request timestamps inside a trailing window.
///
/// Shared through `&self`; the timestamp queue sits behind a mutex that is
/// only held for the prune-and-count step.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    history: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            history: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` and consumes a slot if a request may be sent now.
    ///
    /// A denied check does not consume a slot.
    pub fn can_send_request(&self) -> bool {
        let now = Instant::now();
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        self.prune(&mut history, now);

        if history.len() < self.max_requests {
            history.push_back(now);
            true
        } else {
            false
        }
    }

    /// Slots still available in the current window, without consuming one.
    pub fn remaining(&self) -> usize {
        let now = Instant::now();
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        self.prune(&mut history, now);
        self.max_requests.saturating_sub(history.len())
    }

    fn prune(&self, history: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = history.front() {
            if now.duration_since(oldest) >= self.window {
                history.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}
