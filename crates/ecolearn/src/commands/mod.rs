//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod cache;
pub mod cards;
pub mod config_cmd;
pub mod counts;
pub mod upload;
pub mod util;

use ecolearn_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a controller-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Cards(args) => cards::handle(controller, args, global).await,
        Command::Counts => counts::handle(controller, global).await,
        Command::Add(args) => upload::handle_add(controller, args, global).await,
        Command::Replace(args) => upload::handle_replace(controller, args, global).await,
        Command::Cache(args) => cache::handle(controller, args, global),
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not use the asset controller".into(),
        )),
    }
}
