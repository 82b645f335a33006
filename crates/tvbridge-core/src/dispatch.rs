// ── Command dispatch ──

use tracing::{debug, warn};

use crate::controller::ConnectionController;
use crate::error::DispatchError;
use crate::keys::{self, Command};

/// Validates named commands and forwards them to the live adapter.
#[derive(Clone)]
pub struct CommandDispatcher {
    controller: ConnectionController,
}

impl CommandDispatcher {
    pub fn new(controller: ConnectionController) -> Self {
        Self { controller }
    }

    /// Resolve `name` against the key table and send it once.
    ///
    /// Empty and unknown names are rejected before any adapter is touched.
    /// Adapter failures are returned as-is and never retried.
    pub async fn dispatch(&self, name: &str) -> Result<&'static Command, DispatchError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DispatchError::EmptyCommand);
        }
        let command = keys::lookup(name).ok_or_else(|| DispatchError::UnknownCommand {
            name: name.to_owned(),
        })?;
        self.send(command).await?;
        Ok(command)
    }

    /// Send an already resolved command.
    pub async fn send(&self, command: &Command) -> Result<(), DispatchError> {
        debug!(key = command.code, "dispatching command");
        if let Err(e) = self.controller.send_key(command.code).await {
            warn!(key = command.code, error = %e, "command failed");
            return Err(e);
        }
        Ok(())
    }
}
