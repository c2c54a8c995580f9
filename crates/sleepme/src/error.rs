//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use sleepme_config::ConfigError;
use sleepme_core::{CoreError, ErrorKind};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const RATE_LIMITED: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(sleepme::auth_failed),
        help(
            "The API key was rejected. Generate a new one in the Sleep.me app \
             and pass it with --api-key or set SLEEPME_API_KEY."
        )
    )]
    AuthFailed { message: String },

    #[error("No API key configured for profile '{profile}'")]
    #[diagnostic(
        code(sleepme::no_credentials),
        help(
            "Pass --api-key, set SLEEPME_API_KEY, or add api_key / api_key_env \
             to the profile in {path}"
        )
    )]
    NoCredentials { profile: String, path: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(sleepme::not_found),
        help("Run: sleepme devices to see eligible devices")
    )]
    DeviceNotFound { identifier: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Rate limit exceeded: {message}")]
    #[diagnostic(
        code(sleepme::rate_limited),
        help("Wait a minute before retrying, or lower the poll frequency.")
    )]
    RateLimited { message: String },

    #[error("Could not reach the Sleep.me API: {message}")]
    #[diagnostic(
        code(sleepme::connection_failed),
        help("Check network connectivity, or raise the request timeout with --timeout.")
    )]
    ConnectionFailed { message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(sleepme::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sleepme::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(sleepme::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(sleepme::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::RateLimited { .. } => exit_code::RATE_LIMITED,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Validation { .. } | Self::ProfileNotFound { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::DeviceNotFound { device_id } => CliError::DeviceNotFound {
                identifier: device_id,
            },

            CoreError::ValidationFailed { message: reason } => CliError::Validation {
                field: "temperature".into(),
                reason,
            },

            CoreError::Config { message: reason } => CliError::Validation {
                field: "config".into(),
                reason,
            },

            other => match other.kind() {
                Some(ErrorKind::Authentication) => CliError::AuthFailed { message },
                Some(ErrorKind::RateLimit) => CliError::RateLimited { message },
                Some(ErrorKind::Communication) => CliError::ConnectionFailed { message },
                Some(ErrorKind::Api) | None => CliError::ApiError { message },
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials {
                profile,
                path: sleepme_config::config_path().display().to_string(),
            },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            other => CliError::Config(other),
        }
    }
}
