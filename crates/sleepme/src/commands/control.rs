//! Mutation handlers: target temperature and thermal mode.

use std::sync::Arc;

use sleepme_core::{CacheEntry, Coordinator, ThermalMode};

use crate::cli::{GlobalOpts, ModeArg, SetModeArgs, SetTempArgs};
use crate::error::CliError;
use crate::output;

impl From<ModeArg> for ThermalMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Active => Self::Active,
            ModeArg::Standby => Self::Standby,
        }
    }
}

fn summary(e: &Arc<CacheEntry>) -> String {
    format!(
        "{} ({}): {} at {} °F",
        e.name(),
        e.id(),
        e.control.thermal_control_status,
        e.target_temperature_f()
    )
}

fn print_entry(entry: &Arc<CacheEntry>, global: &GlobalOpts) {
    let out = output::render_single(global.output, entry, summary, |e| e.id().to_owned());
    output::print_output(&out, global.quiet);
}

pub async fn set_temp(
    coordinator: &Coordinator,
    args: &SetTempArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entry = coordinator
        .set_temperature(&args.device, args.fahrenheit)
        .await?;
    print_entry(&entry, global);
    Ok(())
}

pub async fn set_mode(
    coordinator: &Coordinator,
    args: &SetModeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entry = coordinator
        .set_mode(&args.device, args.mode.into())
        .await?;
    print_entry(&entry, global);
    Ok(())
}
