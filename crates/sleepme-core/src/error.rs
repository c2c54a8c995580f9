// ── Core error types ──
//
// Errors surfaced by the coordinator. API failures are wrapped
// transparently so callers can still ask for their `ErrorKind`; the
// remaining variants describe coordinator-level outcomes.

use sleepme_api::ErrorKind;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── API errors (classification preserved) ────────────────────────
    #[error(transparent)]
    Api(#[from] sleepme_api::Error),

    // ── Refresh outcomes ─────────────────────────────────────────────
    /// The API rejected the credential during a refresh. Polling stops
    /// until a new coordinator is built with a fresh key.
    #[error("Authentication failed -- re-authentication required: {message}")]
    ReauthRequired { message: String },

    /// At least one device could not be fetched this cycle. Devices that
    /// did succeed were written to the cache.
    #[error("Refresh failed for {failed} of {total} device(s): {message}")]
    RefreshFailed {
        failed: usize,
        total: usize,
        /// Classification of the last failure seen.
        kind: ErrorKind,
        message: String,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Coordinator not set up -- call setup() first")]
    NotReady,

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Classification of the underlying API failure, if there was one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Api(e) => Some(e.kind()),
            Self::ReauthRequired { .. } => Some(ErrorKind::Authentication),
            Self::RefreshFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the credential was rejected.
    pub fn is_auth(&self) -> bool {
        self.kind() == Some(ErrorKind::Authentication)
    }
}
