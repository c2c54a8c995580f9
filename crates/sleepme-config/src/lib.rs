//! Shared configuration for the Sleep.me CLI.
//!
//! TOML profiles, API-key resolution (env var + plaintext), and
//! translation to `sleepme_core::CoordinatorConfig`. The CLI layers its
//! own flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sleepme_core::{CoordinatorConfig, RateLimitConfig, RateLimitPolicy};

/// Prefix for environment overrides, e.g. `SLEEPME_DEFAULTS__TIMEOUT=5`.
pub const ENV_PREFIX: &str = "SLEEPME_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Pick a profile: the named one, else `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());

        match self.profiles.get(&name) {
            Some(profile) => Ok((name, profile)),
            None => Err(ConfigError::ProfileNotFound { name }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds between background refresh cycles. 0 disables polling.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Budget for one refresh cycle in seconds.
    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout: u64,

    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: usize,

    /// Rate-limit window in seconds.
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window: u64,

    /// `advisory` or `enforce`.
    #[serde(default = "default_rate_limit_policy")]
    pub rate_limit_policy: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            cycle_timeout: default_cycle_timeout(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window: default_rate_limit_window(),
            rate_limit_policy: default_rate_limit_policy(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    sleepme_core::config::DEFAULT_POLL_INTERVAL.as_secs()
}
fn default_cycle_timeout() -> u64 {
    sleepme_core::config::DEFAULT_CYCLE_TIMEOUT.as_secs()
}
fn default_max_concurrent_fetches() -> usize {
    sleepme_core::config::DEFAULT_MAX_CONCURRENT_FETCHES
}
fn default_rate_limit_requests() -> usize {
    RateLimitConfig::default().max_requests
}
fn default_rate_limit_window() -> u64 {
    RateLimitConfig::default().window.as_secs()
}
fn default_rate_limit_policy() -> String {
    RateLimitPolicy::default().to_string()
}

/// A named account profile. Unset fields fall back to [`Defaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// API root override (e.g. a staging host).
    pub base_url: Option<String>,

    /// API key (plaintext -- prefer `api_key_env`).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    pub timeout: Option<u64>,
    pub poll_interval: Option<u64>,
    pub cycle_timeout: Option<u64>,
    pub max_concurrent_fetches: Option<usize>,
    pub rate_limit_policy: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("me", "sleepme", "sleepme").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("sleepme");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve the API key: the profile's `api_key_env` variable first, then
/// the plaintext `api_key`.
pub fn resolve_api_key(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.trim().is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    if let Some(ref key) = profile.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation to runtime config ───────────────────────────────────

/// Build a `CoordinatorConfig` from a profile, resolving its API key.
pub fn profile_to_coordinator_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<CoordinatorConfig, ConfigError> {
    let api_key = resolve_api_key(profile, profile_name)?;
    build_coordinator_config(profile, defaults, api_key)
}

/// Build a `CoordinatorConfig` with an already-resolved API key.
pub fn build_coordinator_config(
    profile: &Profile,
    defaults: &Defaults,
    api_key: SecretString,
) -> Result<CoordinatorConfig, ConfigError> {
    let mut config =
        CoordinatorConfig::new(api_key).map_err(|e| invalid("base_url", e.to_string()))?;

    if let Some(ref raw) = profile.base_url {
        config.base_url = url::Url::parse(raw)
            .map_err(|_| invalid("base_url", format!("invalid URL: {raw}")))?;
    }

    let timeout = profile.timeout.unwrap_or(defaults.timeout);
    if timeout == 0 {
        return Err(invalid("timeout", "must be at least 1 second"));
    }
    config.request_timeout = Duration::from_secs(timeout);

    config.poll_interval =
        Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval));

    let cycle_timeout = profile.cycle_timeout.unwrap_or(defaults.cycle_timeout);
    if cycle_timeout == 0 {
        return Err(invalid("cycle_timeout", "must be at least 1 second"));
    }
    config.cycle_timeout = Duration::from_secs(cycle_timeout);

    let fan_out = profile
        .max_concurrent_fetches
        .unwrap_or(defaults.max_concurrent_fetches);
    if fan_out == 0 {
        return Err(invalid("max_concurrent_fetches", "must be at least 1"));
    }
    config.max_concurrent_fetches = fan_out;

    if defaults.rate_limit_requests == 0 || defaults.rate_limit_window == 0 {
        return Err(invalid(
            "rate_limit",
            "request count and window must both be non-zero",
        ));
    }
    let policy_raw = profile
        .rate_limit_policy
        .as_deref()
        .unwrap_or(&defaults.rate_limit_policy);
    let policy: RateLimitPolicy = policy_raw.parse().map_err(|_| {
        invalid(
            "rate_limit_policy",
            format!("expected 'advisory' or 'enforce', got '{policy_raw}'"),
        )
    })?;
    config.rate_limit = RateLimitConfig {
        max_requests: defaults.rate_limit_requests,
        window: Duration::from_secs(defaults.rate_limit_window),
        policy,
    };

    config
        .validate()
        .map_err(|e| invalid("profile", e.to_string()))?;
    Ok(config)
}
