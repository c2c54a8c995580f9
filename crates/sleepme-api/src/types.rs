//! Response and request types for the Sleep.me developer API (`/v1/`).
//!
//! Field names match the JSON exactly (snake_case). Temperatures are
//! [`Decimal`] so the values the API reports survive a parse/serialize
//! cycle without floating-point drift.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Capability tag a device must carry to be managed by this client.
pub const REQUIRED_ATTACHMENT: &str = "CHILIPAD_PRO";

// ── Devices ──────────────────────────────────────────────────────────

/// Identity record: one element of `GET /v1/devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl Device {
    /// Whether the device carries [`REQUIRED_ATTACHMENT`].
    pub fn is_eligible(&self) -> bool {
        self.attachments.iter().any(|a| a == REQUIRED_ATTACHMENT)
    }
}

// ── Device state ─────────────────────────────────────────────────────

/// Static descriptive attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAbout {
    pub firmware_version: String,
    pub ip_address: String,
    pub lan_address: String,
    pub mac_address: String,
    pub model: String,
    pub serial_number: String,
}

/// Unit the device front panel displays.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TemperatureUnit {
    F,
    C,
}

/// Thermal control status, the device's operating mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ThermalMode {
    Active,
    Standby,
}

/// Operator-facing settings. Returned by `PATCH /v1/devices/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceControl {
    pub brightness_level: i32,
    pub display_temperature_unit: TemperatureUnit,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub set_temperature_c: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub set_temperature_f: Decimal,
    pub thermal_control_status: ThermalMode,
    pub time_zone: String,
}

/// Sensed attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub is_connected: bool,
    pub is_water_low: bool,
    pub water_level: i32,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub water_temperature_c: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub water_temperature_f: Decimal,
}

/// Full state from `GET /v1/devices/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub about: DeviceAbout,
    pub control: DeviceControl,
    pub status: DeviceStatus,
}

// ── Requests ─────────────────────────────────────────────────────────

/// Partial update carrying only the target temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetTemperatureRequest {
    pub set_temperature_f: i32,
}

/// Partial update carrying only the thermal control status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetModeRequest {
    pub thermal_control_status: ThermalMode,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    const CONTROL_JSON: &str = r#"{
        "brightness_level": 100,
        "display_temperature_unit": "f",
        "set_temperature_c": 21.5,
        "set_temperature_f": 70.7,
        "thermal_control_status": "active",
        "time_zone": "America/New_York"
    }"#;

    #[test]
    fn control_decimals_parse_exactly() {
        let control: DeviceControl = serde_json::from_str(CONTROL_JSON).unwrap();

        assert_eq!(control.set_temperature_c, dec!(21.5));
        assert_eq!(control.set_temperature_f, dec!(70.7));
        assert_eq!(control.display_temperature_unit, TemperatureUnit::F);
        assert_eq!(control.thermal_control_status, ThermalMode::Active);
    }

    #[test]
    fn control_decimals_reserialize_without_drift() {
        let control: DeviceControl = serde_json::from_str(CONTROL_JSON).unwrap();

        let out = serde_json::to_string(&control).unwrap();

        assert!(out.contains(r#""set_temperature_c":21.5"#), "{out}");
        assert!(out.contains(r#""set_temperature_f":70.7"#), "{out}");

        let again: DeviceControl = serde_json::from_str(&out).unwrap();
        assert_eq!(again, control);
    }

    #[test]
    fn preset_sentinels_survive_round_trip() {
        let mut control: DeviceControl = serde_json::from_str(CONTROL_JSON).unwrap();
        control.set_temperature_c = dec!(-1);

        let out = serde_json::to_string(&control).unwrap();
        let again: DeviceControl = serde_json::from_str(&out).unwrap();

        assert_eq!(again.set_temperature_c, dec!(-1));
    }

    #[test]
    fn unknown_mode_is_a_schema_error() {
        let body = CONTROL_JSON.replace("\"active\"", "\"turbo\"");
        assert!(serde_json::from_str::<DeviceControl>(&body).is_err());
    }

    #[test]
    fn device_without_attachments_is_not_eligible() {
        let device: Device = serde_json::from_value(json!({"id": "abc", "name": "Bed"})).unwrap();

        assert!(device.attachments.is_empty());
        assert!(!device.is_eligible());
    }

    #[test]
    fn request_bodies_carry_a_single_field() {
        let temp = serde_json::to_string(&SetTemperatureRequest {
            set_temperature_f: 72,
        })
        .unwrap();
        let mode = serde_json::to_string(&SetModeRequest {
            thermal_control_status: ThermalMode::Standby,
        })
        .unwrap();

        assert_eq!(temp, r#"{"set_temperature_f":72}"#);
        assert_eq!(mode, r#"{"thermal_control_status":"standby"}"#);
    }
}
