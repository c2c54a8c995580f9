//! Clap derive structures for the `sleepme` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sleepme -- control Sleep.me bed climate devices from the command line
#[derive(Debug, Parser)]
#[command(
    name = "sleepme",
    version,
    about = "Monitor and control Sleep.me devices from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "SLEEPME_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Developer API key (overrides profile)
    #[arg(long, env = "SLEEPME_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// API root URL (overrides profile)
    #[arg(long, env = "SLEEPME_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SLEEPME_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "SLEEPME_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one device id per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Heating/cooling running
    Active,
    /// Idle
    Standby,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List eligible devices with their current state
    #[command(alias = "ls")]
    Devices,

    /// Show full state for one device, or all devices
    Status(StatusArgs),

    /// Set the target temperature in whole degrees Fahrenheit
    #[command(name = "set-temp")]
    SetTemp(SetTempArgs),

    /// Switch a device between active and standby
    #[command(name = "set-mode")]
    SetMode(SetModeArgs),

    /// Poll in the background and print every change until Ctrl-C
    Watch(WatchArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Device id (omit for all devices)
    pub device: Option<String>,
}

#[derive(Debug, Args)]
pub struct SetTempArgs {
    /// Device id
    pub device: String,

    /// Target temperature, 55-115 °F
    #[arg(allow_negative_numbers = true)]
    pub fahrenheit: i32,
}

#[derive(Debug, Args)]
pub struct SetModeArgs {
    /// Device id
    pub device: String,

    #[arg(value_enum)]
    pub mode: ModeArg,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between polls (overrides profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the configuration with secrets masked
    Show,

    /// Print the configuration file location
    Path,

    /// Set a value on the active profile (created if missing)
    Set {
        /// Profile key, e.g. api_key_env, base_url, timeout
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles; the active one is marked with *
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}
