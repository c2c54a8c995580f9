//! Device listing and status handlers.

use std::sync::Arc;

use sleepme_core::{CacheEntry, Coordinator};
use tabled::Tabled;

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Preset")]
    preset: String,
    #[tabled(rename = "Target °F")]
    target: String,
    #[tabled(rename = "Water °F")]
    water: String,
    #[tabled(rename = "Online")]
    online: String,
    #[tabled(rename = "Water Low")]
    water_low: String,
}

impl From<&Arc<CacheEntry>> for DeviceRow {
    fn from(e: &Arc<CacheEntry>) -> Self {
        Self {
            id: e.id().to_owned(),
            name: e.name().to_owned(),
            mode: e.hvac_mode().to_string(),
            preset: e.preset().to_string(),
            target: e.target_temperature_f().to_string(),
            water: e.current_temperature_f().to_string(),
            online: yes_no(e.is_available()),
            water_low: yes_no(e.is_water_low()),
        }
    }
}

fn yes_no(flag: bool) -> String {
    String::from(if flag { "yes" } else { "no" })
}

fn detail(e: &Arc<CacheEntry>) -> String {
    [
        format!("ID:          {}", e.id()),
        format!("Name:        {}", e.name()),
        format!("Model:       {}", e.about.model),
        format!("Firmware:    {}", e.about.firmware_version),
        format!("Serial:      {}", e.about.serial_number),
        format!("LAN:         {}", e.about.lan_address),
        format!("Online:      {}", yes_no(e.is_available())),
        format!(
            "Mode:        {} ({})",
            e.hvac_mode(),
            e.control.thermal_control_status
        ),
        format!("Preset:      {}", e.preset()),
        format!(
            "Target:      {} °F / {} °C",
            e.control.set_temperature_f, e.control.set_temperature_c
        ),
        format!(
            "Water:       {} °F / {} °C",
            e.status.water_temperature_f, e.status.water_temperature_c
        ),
        format!("Water level: {}%", e.status.water_level),
        format!("Water low:   {}", yes_no(e.is_water_low())),
        format!("Brightness:  {}%", e.control.brightness_level),
        format!("Time zone:   {}", e.control.time_zone),
    ]
    .join("\n")
}

pub(crate) fn render_devices(entries: &[Arc<CacheEntry>], global: &GlobalOpts) -> String {
    output::render_list(
        global.output,
        entries,
        |e| DeviceRow::from(e),
        |e| e.id().to_owned(),
    )
}

// ── Handlers ────────────────────────────────────────────────────────

pub fn list(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    let snap = coordinator.snapshot();
    output::print_output(&render_devices(&snap, global), global.quiet);
    Ok(())
}

pub fn status(
    coordinator: &Coordinator,
    args: &StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = match args.device {
        Some(ref id) => {
            let entry = coordinator
                .cached_state(id)
                .ok_or_else(|| CliError::DeviceNotFound {
                    identifier: id.clone(),
                })?;
            output::render_single(global.output, &entry, detail, |e| e.id().to_owned())
        }
        None => {
            let snap = coordinator.snapshot();
            output::render_single(
                global.output,
                &*snap,
                |all| all.iter().map(detail).collect::<Vec<_>>().join("\n\n"),
                |all| all.iter().map(|e| e.id().to_owned()).collect::<Vec<_>>().join("\n"),
            )
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
