// Hand-crafted async HTTP client for the Sleep.me developer API.
//
// Base path: /v1/
// Auth: Authorization: Bearer <api key>

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::rate_limit::{RateLimitPolicy, RateLimiter};
use crate::transport::{DEFAULT_TIMEOUT, TransportConfig};
use crate::types::{
    Device, DeviceControl, DeviceState, SetModeRequest, SetTemperatureRequest, ThermalMode,
};
use crate::Error;

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.developer.sleep.me/v1/";

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the Sleep.me developer API.
///
/// Every call consults the shared [`RateLimiter`] before it is sent and is
/// bounded by the transport timeout. Failures come back classified; see
/// [`Error::kind`](crate::Error::kind).
#[derive(Debug, Clone)]
pub struct SleepmeClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
    rate_limiter: Arc<RateLimiter>,
    rate_limit_policy: RateLimitPolicy,
}

impl SleepmeClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from an API key and transport config.
    ///
    /// Injects `Authorization: Bearer <key>` as a sensitive default header
    /// on every request.
    pub fn from_api_key(
        base_url: &str,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret())).map_err(|e| {
                Error::InvalidApiKey {
                    reason: format!("not a valid header value: {e}"),
                }
            })?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let http = transport.build_client_with_headers(headers)?;
        let mut client = Self::from_reqwest(base_url, http)?;
        client.timeout_secs = transport.timeout_secs();
        Ok(client)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: Self::normalize_base_url(base_url)?,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            rate_limiter: Arc::new(RateLimiter::default()),
            rate_limit_policy: RateLimitPolicy::default(),
        })
    }

    /// Replace the limiter and the policy applied when it reports no capacity.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>, policy: RateLimitPolicy) -> Self {
        self.rate_limiter = limiter;
        self.rate_limit_policy = policy;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Ensure the base URL ends with `/` so relative joins append.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    // ── URL builders ─────────────────────────────────────────────────

    fn devices_url(&self) -> Result<Url, Error> {
        Ok(self.base_url.join("devices")?)
    }

    /// `{base}/devices/{id}` with the id percent-encoded as one segment.
    fn device_url(&self, device_id: &str) -> Result<Url, Error> {
        let mut url = self.devices_url()?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(device_id);
        Ok(url)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// List devices carrying the required capability tag.
    ///
    /// `GET /v1/devices`, in the order the API returns them.
    pub async fn list_devices(&self) -> Result<Vec<Device>, Error> {
        let url = self.devices_url()?;
        let devices: Vec<Device> = self.request(Method::GET, url, None::<&()>).await?;
        let total = devices.len();

        let eligible: Vec<Device> = devices.into_iter().filter(Device::is_eligible).collect();
        debug!(total, eligible = eligible.len(), "listed devices");
        Ok(eligible)
    }

    /// Fetch about, control and status for one device.
    ///
    /// `GET /v1/devices/{id}`
    pub async fn get_device_state(&self, device_id: &str) -> Result<DeviceState, Error> {
        let url = self.device_url(device_id)?;
        self.request(Method::GET, url, None::<&()>).await
    }

    /// Set the target temperature in whole degrees Fahrenheit.
    ///
    /// `PATCH /v1/devices/{id}` with `{"set_temperature_f": n}`. Returns the
    /// control record the server settled on.
    pub async fn set_temperature(
        &self,
        device_id: &str,
        fahrenheit: i32,
    ) -> Result<DeviceControl, Error> {
        let url = self.device_url(device_id)?;
        debug!(device_id, fahrenheit, "setting target temperature");
        let body = SetTemperatureRequest {
            set_temperature_f: fahrenheit,
        };
        self.request(Method::PATCH, url, Some(&body)).await
    }

    /// Switch the thermal control status.
    ///
    /// `PATCH /v1/devices/{id}` with `{"thermal_control_status": "active"|"standby"}`.
    pub async fn set_mode(&self, device_id: &str, mode: ThermalMode) -> Result<DeviceControl, Error> {
        let url = self.device_url(device_id)?;
        debug!(device_id, %mode, "setting thermal control status");
        let body = SetModeRequest {
            thermal_control_status: mode,
        };
        self.request(Method::PATCH, url, Some(&body)).await
    }

    // ── Request helper ───────────────────────────────────────────────

    /// Send one request and decode the body into `T`.
    async fn request<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.check_rate_limit(&method, &url)?;
        debug!(remaining = self.rate_limiter.remaining(), "{method} {url}");

        let mut req = self.http.request(method.clone(), url.clone());
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();

        if !status.is_success() {
            return Err(status_error(status, resp).await);
        }

        let text = resp.text().await.map_err(|e| self.transport_error(e))?;
        debug!("{method} {url} response: {text}");

        serde_json::from_str(&text).map_err(|e| {
            let preview = text.chars().take(200).collect::<String>();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: text,
            }
        })
    }

    fn check_rate_limit(&self, method: &Method, url: &Url) -> Result<(), Error> {
        if self.rate_limiter.can_send_request() {
            return Ok(());
        }

        match self.rate_limit_policy {
            RateLimitPolicy::Advisory => {
                warn!(%method, %url, "local rate limit exceeded, sending anyway");
                Ok(())
            }
            RateLimitPolicy::Enforce => {
                warn!(%method, %url, "local rate limit exceeded, request not sent");
                Err(Error::RateLimited {
                    retry_after_secs: None,
                })
            }
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// Map a non-success status onto the error taxonomy.
async fn status_error(status: StatusCode, resp: reqwest::Response) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication {
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited {
            retry_after_secs: resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok()),
        },
        _ => {
            let raw = resp.text().await.unwrap_or_default();
            Error::Status {
                status: status.as_u16(),
                message: if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                },
            }
        }
    }
}
