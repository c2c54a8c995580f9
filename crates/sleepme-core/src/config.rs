// ── Runtime coordinator configuration ──
//
// Describes how to reach the Sleep.me API and how aggressively to poll
// it. Carries the credential but never touches disk; the CLI builds a
// `CoordinatorConfig` from its profile and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use sleepme_api::{RateLimitPolicy, RateLimiter, TransportConfig};
use url::Url;

use crate::error::CoreError;

/// Default time between background refresh cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default budget for a whole refresh cycle across all devices.
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of device-state fetches in flight at once.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;

/// Local request budget shared by every call the coordinator makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
    pub policy: RateLimitPolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let limiter = RateLimiter::default();
        Self {
            max_requests: limiter.max_requests(),
            window: limiter.window(),
            policy: RateLimitPolicy::default(),
        }
    }
}

impl RateLimitConfig {
    pub fn build(&self) -> RateLimiter {
        RateLimiter::new(self.max_requests, self.window)
    }
}

/// Configuration for one coordinator (one account).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Bearer token for the developer API.
    pub api_key: SecretString,
    /// API root, normally [`sleepme_api::DEFAULT_BASE_URL`].
    pub base_url: Url,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Time between background refresh cycles. Zero disables the loop.
    pub poll_interval: Duration,
    /// Budget for one refresh cycle. Devices still pending when it
    /// expires are recorded as failed.
    pub cycle_timeout: Duration,
    /// Upper bound on concurrent device-state fetches.
    pub max_concurrent_fetches: usize,
    pub rate_limit: RateLimitConfig,
}

impl CoordinatorConfig {
    /// Defaults for everything except the credential.
    pub fn new(api_key: SecretString) -> Result<Self, CoreError> {
        let base_url = Url::parse(sleepme_api::DEFAULT_BASE_URL).map_err(|e| CoreError::Config {
            message: format!("invalid default base URL: {e}"),
        })?;

        Ok(Self {
            api_key,
            base_url,
            request_timeout: TransportConfig::default().timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            rate_limit: RateLimitConfig::default(),
        })
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.request_timeout,
            ..TransportConfig::default()
        }
    }

    /// Reject settings the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_concurrent_fetches == 0 {
            return Err(CoreError::Config {
                message: "max_concurrent_fetches must be at least 1".into(),
            });
        }
        if self.cycle_timeout.is_zero() {
            return Err(CoreError::Config {
                message: "cycle_timeout must be greater than zero".into(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(CoreError::Config {
                message: "request_timeout must be greater than zero".into(),
            });
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window.is_zero() {
            return Err(CoreError::Config {
                message: "rate limit needs a non-zero request count and window".into(),
            });
        }
        Ok(())
    }
}
