//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod watch;

use sleepme_core::Coordinator;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    coordinator: &Coordinator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices => devices::list(coordinator, global),
        Command::Status(args) => devices::status(coordinator, &args, global),
        Command::SetTemp(args) => control::set_temp(coordinator, &args, global).await,
        Command::SetMode(args) => control::set_mode(coordinator, &args, global).await,
        Command::Watch(_) => watch::handle(coordinator, global).await,
        // Handled in main before a coordinator exists.
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
