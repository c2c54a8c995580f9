//! CLI flag overrides on top of `sleepme_config` profiles.
//!
//! Core never sees these types -- it receives a pre-built `CoordinatorConfig`.

use secrecy::SecretString;
use sleepme_config::{Config, ConfigError, Profile};
use sleepme_core::CoordinatorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Build a `CoordinatorConfig` from the config file, profile, and CLI overrides.
pub fn build_coordinator_config(global: &GlobalOpts) -> Result<CoordinatorConfig, CliError> {
    let cfg = sleepme_config::load_config()?;
    let (profile_name, profile) = select_profile(global, &cfg)?;
    let profile = apply_overrides(profile, global);

    let config = match global.api_key {
        Some(ref key) => sleepme_config::build_coordinator_config(
            &profile,
            &cfg.defaults,
            SecretString::from(key.clone()),
        )?,
        None => {
            sleepme_config::profile_to_coordinator_config(&profile, &profile_name, &cfg.defaults)?
        }
    };
    Ok(config)
}

/// Pick the requested profile. When none was asked for and the default
/// profile does not exist, fall back to an empty profile so flags and
/// environment variables alone are enough.
fn select_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    match cfg.profile(global.profile.as_deref()) {
        Ok((name, profile)) => Ok((name, profile.clone())),
        Err(ConfigError::ProfileNotFound { name }) if global.profile.is_none() => {
            Ok((name, Profile::default()))
        }
        Err(ConfigError::ProfileNotFound { name }) => {
            let available = if cfg.profiles.is_empty() {
                "(none)".to_owned()
            } else {
                cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
            };
            Err(CliError::ProfileNotFound { name, available })
        }
        Err(e) => Err(e.into()),
    }
}

fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref url) = global.base_url {
        profile.base_url = Some(url.clone());
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    profile
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["sleepme"];
        argv.extend_from_slice(args);
        argv.push("devices");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with(names: &[&str]) -> Config {
        let mut cfg = Config::default();
        for name in names {
            cfg.profiles.insert(
                (*name).to_owned(),
                Profile {
                    api_key: Some(format!("{name}-key")),
                    ..Profile::default()
                },
            );
        }
        cfg
    }

    #[test]
    fn missing_implicit_default_falls_back_to_empty_profile() {
        let (name, profile) = select_profile(&global(&[]), &config_with(&[])).unwrap();

        assert_eq!(name, "default");
        assert_eq!(profile, Profile::default());
    }

    #[test]
    fn missing_named_profile_lists_alternatives() {
        let err = select_profile(&global(&["--profile", "guest"]), &config_with(&["home", "lab"]))
            .unwrap_err();

        match err {
            CliError::ProfileNotFound { name, available } => {
                assert_eq!(name, "guest");
                assert_eq!(available, "home, lab");
            }
            other => panic!("expected ProfileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn flags_override_profile_fields() {
        let profile = apply_overrides(
            Profile {
                timeout: Some(30),
                ..Profile::default()
            },
            &global(&["--timeout", "4", "--base-url", "http://localhost:9/v1"]),
        );

        assert_eq!(profile.timeout, Some(4));
        assert_eq!(profile.base_url.as_deref(), Some("http://localhost:9/v1"));
    }
}
