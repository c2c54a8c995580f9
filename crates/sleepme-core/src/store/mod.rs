// ── Device state cache ──

mod device_store;

pub use device_store::{DeviceStore, Snapshot};
