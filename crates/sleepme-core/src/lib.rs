// sleepme-core: Polling coordinator and shared device cache over sleepme-api.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CoordinatorConfig, RateLimitConfig};
pub use coordinator::{Coordinator, CoordinatorState, DeviceFailure, RefreshReport};
pub use error::CoreError;
pub use model::{CacheEntry, HvacMode, MAX_TEMPERATURE_F, MIN_TEMPERATURE_F, Preset};
pub use store::{DeviceStore, Snapshot};
pub use stream::StateStream;

// Re-export API types consumers need to drive the coordinator.
pub use sleepme_api::{DEFAULT_BASE_URL, ErrorKind, RateLimitPolicy, ThermalMode};
