// Shared transport configuration for building the reqwest::Client.
//
// Timeout, user agent and default headers live here so the client module
// stays focused on request/response mechanics.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

/// Whole-request timeout the remote service is budgeted for.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("sleepme-rs/", env!("CARGO_PKG_VERSION"));

/// Transport configuration for building the HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Bound on the full request/response cycle, body included.
    pub timeout: Duration,
    /// Bound on establishing the TCP/TLS connection.
    pub connect_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` with the given default headers merged on
    /// top of the JSON content-type header.
    ///
    /// Used by [`SleepmeClient`](crate::SleepmeClient) to inject the bearer
    /// `Authorization` header once instead of per request.
    pub fn build_client_with_headers(
        &self,
        mut headers: HeaderMap,
    ) -> Result<reqwest::Client, crate::error::Error> {
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=UTF-8"),
        );

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers);

        if let Some(connect_timeout) = self.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        Ok(builder.build()?)
    }

    /// Timeout in whole seconds, for error reporting.
    pub(crate) fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}
