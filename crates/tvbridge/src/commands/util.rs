//! Shared helpers for command handlers that talk to the TV.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use tvbridge_core::{Bridge, ConnectionController, ConnectionState, CoreError, PairError};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::host::ConsoleHost;

/// A running bridge for the resolved TV.
pub struct Session {
    pub bridge: Bridge,
    pub host: Arc<ConsoleHost>,
}

impl Session {
    pub fn address(&self) -> &str {
        &self.bridge.config().address
    }
}

/// Resolve the TV and start the bridge with the real adapters.
pub fn start(global: &GlobalOpts) -> Result<Session, CliError> {
    let resolved = config::resolve_device(global)?;
    debug!(
        address = %resolved.device.address,
        protocol = %resolved.device.variant,
        profile = ?resolved.profile_name,
        "starting bridge"
    );
    let host = ConsoleHost::new(resolved.profile_name);
    let bridge = Bridge::start_default(resolved.device, host.clone())?;
    Ok(Session { bridge, host })
}

/// Wait until the controller holds a session, asking for a PIN on the
/// terminal when the TV demands one.
pub async fn wait_connected(session: &Session, wait: Duration) -> Result<(), CliError> {
    let controller = session.bridge.controller();
    let mut states = controller.subscribe();
    let mut deadline = Instant::now() + wait;

    loop {
        let state = *states.borrow_and_update();
        match state {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::PairingRequired => {
                prompt_for_pin(controller).await?;
                deadline = Instant::now() + wait;
            }
            _ => {}
        }

        match tokio::time::timeout_at(deadline, states.changed()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                return Err(CliError::ConnectionFailed {
                    message: "connection controller stopped".into(),
                });
            }
            Err(_) => {
                return Err(CliError::ConnectTimeout {
                    address: session.address().to_owned(),
                    seconds: wait.as_secs(),
                });
            }
        }
    }
}

/// Read PINs from the terminal until the TV accepts one.
async fn prompt_for_pin(controller: &ConnectionController) -> Result<(), CliError> {
    if !std::io::stdin().is_terminal() {
        return Err(CliError::PairingRequired);
    }
    loop {
        let pin = tokio::task::spawn_blocking(|| {
            dialoguer::Input::<String>::new()
                .with_prompt("PIN shown on the TV")
                .interact_text()
        })
        .await
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?
        .map_err(|e| CliError::Validation {
            field: "interactive".into(),
            reason: format!("prompt failed: {e}"),
        })?;

        match controller.submit_pin(&pin).await {
            Ok(()) => return Ok(()),
            Err(CoreError::Pair(PairError::WrongPin)) => {
                eprintln!("   ✗ The TV rejected that PIN, try again");
            }
            Err(e) => return Err(e.into()),
        }
    }
}
