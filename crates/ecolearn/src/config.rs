//! CLI configuration: thin wrapper around `ecolearn_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--api-url, --timeout, --insecure, --no-snapshot).

use std::time::Duration;

use ecolearn_core::{SyncConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use ecolearn_config::{
    Config, Profile, config_path, load_config, load_config_or_default, save_config,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Build the `SyncConfig` for this invocation.
///
/// Flag > environment > profile > defaults. Without a matching profile
/// an `--api-url` alone is enough, with a snapshot named after the
/// requested profile.
pub fn resolve_sync_config(global: &GlobalOpts) -> Result<SyncConfig, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match (cfg.profiles.get(&profile_name), global.api_url.as_deref()) {
        (Some(profile), _) => profile.clone(),
        (None, Some(url)) => Profile::new(url),
        // An explicitly requested profile must exist.
        (None, None) if global.profile.is_some() => cfg.profile(&profile_name)?.clone(),
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }
    if global.no_snapshot {
        profile.memory_only = true;
    }

    let mut sync = ecolearn_config::profile_to_sync_config(&profile, &profile_name, &cfg.defaults)?;
    if global.insecure {
        sync.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        sync.timeout = Duration::from_secs(secs);
    }
    Ok(sync)
}

