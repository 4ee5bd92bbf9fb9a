//! Local cache inspection and clearing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use ecolearn_core::Controller;

use crate::cli::{CacheArgs, CacheCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct CachedPayload {
    key: String,
    stored_at: DateTime<Utc>,
    age_secs: i64,
    fresh: bool,
}

#[derive(Tabled)]
struct CacheRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Stored")]
    stored: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Fresh")]
    fresh: &'static str,
}

impl From<&CachedPayload> for CacheRow {
    fn from(p: &CachedPayload) -> Self {
        Self {
            key: p.key.clone(),
            stored: p.stored_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            age: format!("{}s", p.age_secs),
            fresh: if p.fresh { "yes" } else { "stale" },
        }
    }
}

pub fn handle(controller: &Controller, args: CacheArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        CacheCommand::Status => {
            let now = Utc::now();
            let payloads: Vec<CachedPayload> = controller
                .cache()
                .entries()
                .into_iter()
                .map(|e| CachedPayload {
                    age_secs: (now - e.stored_at).num_seconds().max(0),
                    key: e.key,
                    stored_at: e.stored_at,
                    fresh: e.fresh,
                })
                .collect();

            match controller.config().snapshot_path {
                Some(ref path) => util::notice(global, &format!("Snapshot: {}", path.display())),
                None => util::notice(global, "Snapshot: disabled (memory only)"),
            }
            if payloads.is_empty() {
                util::notice(global, "Cache is empty.");
            }

            let out = output::render_list(
                &global.output,
                &payloads,
                |p| CacheRow::from(p),
                |p| p.key.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CacheCommand::Clear => {
            if !util::confirm("Clear every cached payload?", global.yes)? {
                return Ok(());
            }
            controller.invalidate_all();
            util::notice(global, "✓ Cache cleared");
            Ok(())
        }
    }
}
