//! Config subcommand handlers.

use std::fmt::Write as _;

use sleepme_config::{Config, Profile};
use sleepme_core::RateLimitPolicy;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

const VALID_KEYS: &str = "base_url, api_key, api_key_env, timeout, poll_interval, \
                          cycle_timeout, max_concurrent_fetches, rate_limit_policy";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config with plaintext keys masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.api_key.is_some() {
            profile.api_key = Some("****".into());
        }
    }
    cfg
}

/// TOML-like rendering for table output.
fn format_config(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let d = &cfg.defaults;
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", d.output);
    let _ = writeln!(out, "timeout = {}", d.timeout);
    let _ = writeln!(out, "poll_interval = {}", d.poll_interval);
    let _ = writeln!(out, "cycle_timeout = {}", d.cycle_timeout);
    let _ = writeln!(out, "max_concurrent_fetches = {}", d.max_concurrent_fetches);
    let _ = writeln!(out, "rate_limit_requests = {}", d.rate_limit_requests);
    let _ = writeln!(out, "rate_limit_window = {}", d.rate_limit_window);
    let _ = writeln!(out, "rate_limit_policy = \"{}\"", d.rate_limit_policy);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        if let Some(ref url) = p.base_url {
            let _ = writeln!(out, "base_url = \"{url}\"");
        }
        if let Some(ref key) = p.api_key {
            let _ = writeln!(out, "api_key = \"{key}\"");
        }
        if let Some(ref env) = p.api_key_env {
            let _ = writeln!(out, "api_key_env = \"{env}\"");
        }
        if let Some(v) = p.timeout {
            let _ = writeln!(out, "timeout = {v}");
        }
        if let Some(v) = p.poll_interval {
            let _ = writeln!(out, "poll_interval = {v}");
        }
        if let Some(v) = p.cycle_timeout {
            let _ = writeln!(out, "cycle_timeout = {v}");
        }
        if let Some(v) = p.max_concurrent_fetches {
            let _ = writeln!(out, "max_concurrent_fetches = {v}");
        }
        if let Some(ref v) = p.rate_limit_policy {
            let _ = writeln!(out, "rate_limit_policy = \"{v}\"");
        }
    }

    out.trim_end().to_owned()
}

fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: format!("'{value}' is not a whole number"),
    })
}

/// Apply one `key = value` setting to a profile.
fn apply_setting(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "base_url" | "base-url" => {
            if url::Url::parse(&value).is_err() {
                return Err(CliError::Validation {
                    field: "base_url".into(),
                    reason: format!("invalid URL: {value}"),
                });
            }
            profile.base_url = Some(value);
        }
        "api_key" | "api-key" => profile.api_key = Some(value),
        "api_key_env" | "api-key-env" => profile.api_key_env = Some(value),
        "timeout" => profile.timeout = Some(parse_number(key, &value)?),
        "poll_interval" | "poll-interval" => profile.poll_interval = Some(parse_number(key, &value)?),
        "cycle_timeout" | "cycle-timeout" => profile.cycle_timeout = Some(parse_number(key, &value)?),
        "max_concurrent_fetches" | "max-concurrent-fetches" => {
            profile.max_concurrent_fetches = Some(parse_number(key, &value)?);
        }
        "rate_limit_policy" | "rate-limit-policy" => {
            if value.parse::<RateLimitPolicy>().is_err() {
                return Err(CliError::Validation {
                    field: "rate_limit_policy".into(),
                    reason: "must be 'advisory' or 'enforce'".into(),
                });
            }
            profile.rate_limit_policy = Some(value);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!("unknown config key '{other}'. Valid keys: {VALID_KEYS}"),
            });
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = redacted(&sleepme_config::load_config()?);
            let out = output::render_single(global.output, &cfg, format_config, |_| {
                sleepme_config::config_path().display().to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let path = sleepme_config::config_path();
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = sleepme_config::load_config()?;
            let profile_name = active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();

            apply_setting(profile, &key, value)?;

            let path = sleepme_config::save_config(&cfg)?;
            tracing::info!(path = %path.display(), "configuration saved");
            if !global.quiet {
                eprintln!("Set {key} on profile '{profile_name}'");
            }
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = sleepme_config::load_config()?;
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: sleepme config set api_key_env <VAR>");
                return Ok(());
            }
            let default = active_profile_name(global, &cfg);
            let out = cfg
                .profiles
                .keys()
                .map(|name| {
                    if *name == default {
                        format!("{name} *")
                    } else {
                        name.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = sleepme_config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: available_profiles(&cfg),
                    name,
                });
            }

            cfg.default_profile = Some(name.clone());
            sleepme_config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }
    }
}
