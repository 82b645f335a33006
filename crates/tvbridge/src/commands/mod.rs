//! Command handlers, one module per subcommand.

pub mod config_cmd;
pub mod keys;
pub mod power;
pub mod run;
pub mod send;
pub mod status;
mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a parsed command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run => run::handle(global).await,
        Command::Send(args) => send::handle(args, global).await,
        Command::Power(args) => power::handle(args, global).await,
        Command::Status => status::handle(global).await,
        Command::Keys(args) => keys::handle(&args, global),
        Command::Config(args) => config_cmd::handle(args, global),
        // Handled in main before a TV is resolved.
        Command::Completions(_) => Ok(()),
    }
}
