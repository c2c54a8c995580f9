// ── Cached device model ──
//
// One `CacheEntry` per eligible device: the identity record from the
// device list merged with the latest about/control/status snapshot.
// The derived views here are what a thermostat front end renders.

use rust_decimal::Decimal;
use serde::Serialize;
use sleepme_api::{Device, DeviceAbout, DeviceControl, DeviceState, DeviceStatus, ThermalMode};

/// Lowest target temperature the device accepts, in whole °F.
pub const MIN_TEMPERATURE_F: i32 = 55;

/// Highest target temperature the device accepts, in whole °F.
pub const MAX_TEMPERATURE_F: i32 = 115;

/// `set_temperature_c` value the API reports while running at full heat.
pub const MAX_HEAT_SENTINEL_C: Decimal = Decimal::from_parts(999, 0, 0, false, 0);

/// `set_temperature_c` value the API reports while running at full cool.
pub const MAX_COOL_SENTINEL_C: Decimal = Decimal::from_parts(1, 0, 0, true, 0);

// ── Derived views ────────────────────────────────────────────────────

/// Thermostat-style operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HvacMode {
    Off,
    HeatCool,
}

impl From<ThermalMode> for HvacMode {
    fn from(mode: ThermalMode) -> Self {
        match mode {
            ThermalMode::Active => Self::HeatCool,
            ThermalMode::Standby => Self::Off,
        }
    }
}

impl From<HvacMode> for ThermalMode {
    fn from(mode: HvacMode) -> Self {
        match mode {
            HvacMode::HeatCool => Self::Active,
            HvacMode::Off => Self::Standby,
        }
    }
}

/// Full-power presets, recognised by their sentinel set points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Preset {
    None,
    MaxHeat,
    MaxCool,
}

// ── CacheEntry ───────────────────────────────────────────────────────

/// Everything known about one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub device: Device,
    pub about: DeviceAbout,
    pub control: DeviceControl,
    pub status: DeviceStatus,
}

impl CacheEntry {
    /// Merge an identity record with a freshly fetched state.
    pub fn merge(device: Device, state: DeviceState) -> Self {
        let DeviceState {
            about,
            control,
            status,
        } = state;
        Self {
            device,
            about,
            control,
            status,
        }
    }

    pub fn id(&self) -> &str {
        &self.device.id
    }

    pub fn name(&self) -> &str {
        &self.device.name
    }

    /// Same identity with a new state snapshot.
    pub(crate) fn with_state(&self, state: DeviceState) -> Self {
        Self::merge(self.device.clone(), state)
    }

    /// Same identity, about and status; control replaced wholesale.
    pub(crate) fn with_control(&self, control: DeviceControl) -> Self {
        Self {
            control,
            ..self.clone()
        }
    }

    /// Whether the device is reachable by the cloud service.
    pub fn is_available(&self) -> bool {
        self.status.is_connected
    }

    pub fn is_water_low(&self) -> bool {
        self.status.is_water_low
    }

    pub fn hvac_mode(&self) -> HvacMode {
        self.control.thermal_control_status.into()
    }

    /// Active preset. Always [`Preset::None`] while the device is off.
    pub fn preset(&self) -> Preset {
        if self.hvac_mode() == HvacMode::Off {
            return Preset::None;
        }
        match self.control.set_temperature_c {
            c if c == MAX_HEAT_SENTINEL_C => Preset::MaxHeat,
            c if c == MAX_COOL_SENTINEL_C => Preset::MaxCool,
            _ => Preset::None,
        }
    }

    pub fn target_temperature_f(&self) -> Decimal {
        self.control.set_temperature_f
    }

    /// Water temperature, the closest thing the device has to a room reading.
    pub fn current_temperature_f(&self) -> Decimal {
        self.status.water_temperature_f
    }
}

/// Check a requested set point against the device's accepted range.
pub fn is_valid_target_f(fahrenheit: i32) -> bool {
    (MIN_TEMPERATURE_F..=MAX_TEMPERATURE_F).contains(&fahrenheit)
}
