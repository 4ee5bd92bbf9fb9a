//! Config subcommand handlers.

use std::io::IsTerminal;

use dialoguer::Input;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Profile};
use crate::error::CliError;
use crate::output;

use super::util;

const DEFAULT_API_URL: &str = "http://localhost:5000";

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init { api_url, name } => {
            let config_path = config::config_path();

            let api_url = match api_url {
                Some(url) => url,
                None if std::io::stdin().is_terminal() => {
                    eprintln!("EcoLearn CLI configuration");
                    eprintln!("   Config path: {}\n", config_path.display());
                    Input::new()
                        .with_prompt("Admin API URL")
                        .default(DEFAULT_API_URL.to_owned())
                        .interact_text()
                        .map_err(util::prompt_err)?
                }
                None => DEFAULT_API_URL.to_owned(),
            };
            if url::Url::parse(&api_url).is_err() {
                return Err(CliError::Validation {
                    field: "api_url".into(),
                    reason: format!("invalid URL: {api_url}"),
                });
            }

            let mut cfg = config::load_config_or_default();
            if cfg.profiles.contains_key(&name)
                && !util::confirm(&format!("Overwrite profile '{name}'?"), global.yes)?
            {
                return Ok(());
            }
            cfg.profiles.insert(name.clone(), Profile::new(api_url));
            let default_missing = cfg
                .default_profile
                .as_ref()
                .is_none_or(|d| !cfg.profiles.contains_key(d));
            if default_missing {
                cfg.default_profile = Some(name.clone());
            }

            let path = config::save_config(&cfg)?;
            util::notice(
                global,
                &format!("✓ Configuration written to {}", path.display()),
            );
            util::notice(global, &format!("  Profile: {name}"));
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| format!("{c:#?}"),
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                util::notice(global, "No profiles configured. Run: ecolearn config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            cfg.profile(&name)?;
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            util::notice(global, &format!("✓ Default profile set to '{name}'"));
            Ok(())
        }
    }
}
