use thiserror::Error;

/// Top-level error type for the `sleepme-api` crate.
///
/// Every failure the client can produce lands in one of these variants.
/// [`Error::kind`] collapses them into the four-way taxonomy callers
/// branch on; `sleepme-core` relies on that to decide between isolating
/// a failure and halting the refresh cycle.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The API rejected the bearer token (HTTP 401 or 403).
    #[error("Authentication failed (HTTP {status}): invalid credentials")]
    Authentication { status: u16 },

    /// The API key cannot be encoded as an HTTP header value.
    #[error("Invalid API key: {reason}")]
    InvalidApiKey { reason: String },

    // ── Throttling ──────────────────────────────────────────────────
    /// The remote returned 429, or the local limiter refused the call
    /// under [`RateLimitPolicy::Enforce`](crate::RateLimitPolicy::Enforce).
    #[error("Rate limit exceeded{}", retry_hint(*.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    // ── Transport ───────────────────────────────────────────────────
    /// Non-success status other than auth or throttling.
    #[error("Unexpected HTTP status {status}: {message}")]
    Status { status: u16, message: String },

    /// The whole request/response cycle exceeded the call timeout.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// A 2xx body did not match the expected record schema.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials rejected. Terminal until the caller re-authenticates.
    Authentication,
    /// Remote-side throttling. Back off before the next attempt.
    RateLimit,
    /// Timeout, DNS/connection failure, or a non-2xx status.
    Communication,
    /// Anything else, including schema mismatches on successful responses.
    Api,
}

impl Error {
    /// Classify this error into the four-way taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::Status { .. } | Self::Timeout { .. } => ErrorKind::Communication,
            Self::Transport(e) => classify_transport(e),
            Self::InvalidApiKey { .. } | Self::InvalidUrl(_) | Self::Deserialization { .. } => {
                ErrorKind::Api
            }
        }
    }

    /// Returns `true` if the credentials were rejected.
    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }

    /// Returns `true` if the next scheduled attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Communication | ErrorKind::RateLimit
        )
    }
}

fn classify_transport(err: &reqwest::Error) -> ErrorKind {
    if err.is_builder() || err.is_decode() {
        ErrorKind::Api
    } else {
        ErrorKind::Communication
    }
}

fn retry_hint(retry_after_secs: Option<u64>) -> String {
    retry_after_secs.map_or_else(String::new, |s| format!(" -- retry after {s}s"))
}
