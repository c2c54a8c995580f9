//! `watch`: run the background refresh loop and print each change.

use chrono::Local;
use sleepme_core::{Coordinator, CoordinatorState};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::devices::render_devices;

pub async fn handle(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    if coordinator.config().poll_interval.is_zero() {
        return Err(CliError::Validation {
            field: "poll_interval".into(),
            reason: "watch needs a non-zero poll interval (use --interval)".into(),
        });
    }

    let mut changes = coordinator.subscribe();
    let mut state = coordinator.state();
    coordinator.start().await?;

    print_snapshot(&changes.latest(), global);

    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => break signal.map_err(CliError::from),
            snap = changes.changed() => match snap {
                Some(snap) => print_snapshot(&snap, global),
                None => break Ok(()),
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                if *state.borrow_and_update() == CoordinatorState::Halted {
                    break Err(CliError::AuthFailed {
                        message: "API key rejected while polling".into(),
                    });
                }
            }
        }
    };

    coordinator.shutdown().await;
    result
}

fn print_snapshot(snap: &sleepme_core::Snapshot, global: &GlobalOpts) {
    if !global.quiet {
        tracing::info!(at = %Local::now().format("%H:%M:%S"), devices = snap.len(), "state updated");
    }
    output::print_output(&render_devices(snap, global), global.quiet);
}
