// sleepme-api: Async Rust client for the Sleep.me developer API

pub mod client;
pub mod error;
pub mod rate_limit;
pub mod transport;
pub mod types;

pub use client::{DEFAULT_BASE_URL, SleepmeClient};
pub use error::{Error, ErrorKind};
pub use rate_limit::{RateLimitPolicy, RateLimiter};
pub use transport::TransportConfig;
pub use types::{
    Device, DeviceAbout, DeviceControl, DeviceState, DeviceStatus, REQUIRED_ATTACHMENT,
    TemperatureUnit, ThermalMode,
};
