// ── Bridge ──
//
// Composition root: wires controller, reconciler and dispatcher to one
// host and routes inbound user commands to them.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::adapter::{AdapterFactory, DefaultAdapterFactory};
use crate::config::DeviceConfig;
use crate::controller::ConnectionController;
use crate::dispatch::CommandDispatcher;
use crate::error::{CoreError, DispatchError};
use crate::host::{self, HostPlatform, StateValue};
use crate::keys;
use crate::power::PowerStateReconciler;
use crate::probe::{Reachability, TcpProbe};

/// A running bridge for one TV.
pub struct Bridge {
    config: Arc<DeviceConfig>,
    host: Arc<dyn HostPlatform>,
    controller: ConnectionController,
    reconciler: PowerStateReconciler,
    dispatcher: CommandDispatcher,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Bridge {
    /// Validate `config`, spawn the background tasks and start connecting.
    pub fn start(
        config: DeviceConfig,
        host: Arc<dyn HostPlatform>,
        factory: Arc<dyn AdapterFactory>,
        probe: Arc<dyn Reachability>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let config = Arc::new(config);
        let cancel = CancellationToken::new();

        let (controller, controller_task) = ConnectionController::spawn(
            Arc::clone(&config),
            Arc::clone(&host),
            factory,
            Arc::clone(&probe),
            cancel.child_token(),
        );
        let (reconciler, reconciler_task) = PowerStateReconciler::spawn(
            Arc::clone(&config),
            Arc::clone(&host),
            probe,
            controller.clone(),
            cancel.child_token(),
        );
        controller.start();

        Ok(Self {
            dispatcher: CommandDispatcher::new(controller.clone()),
            config,
            host,
            controller,
            reconciler,
            cancel,
            tasks: vec![controller_task, reconciler_task],
        })
    }

    /// Start with the real wire adapters and the TCP reachability probe.
    pub fn start_default(config: DeviceConfig, host: Arc<dyn HostPlatform>) -> Result<Self, CoreError> {
        let probe = Arc::new(TcpProbe::new(config.probe_ports.clone()));
        let factory = Arc::new(DefaultAdapterFactory::new(config.clone()));
        Self::start(config, host, factory, probe)
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn controller(&self) -> &ConnectionController {
        &self.controller
    }

    pub fn reconciler(&self) -> &PowerStateReconciler {
        &self.reconciler
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Route a user write of `value` to state `key`.
    pub async fn handle_user_command(&self, key: &str, value: StateValue) -> Result<(), CoreError> {
        debug!(key, %value, "user command");
        match key {
            host::COMMAND => {
                let name = value.to_string();
                if name.trim().is_empty() {
                    return Ok(());
                }
                let result = self.dispatcher.dispatch(&name).await;
                self.host
                    .publish_state(host::COMMAND, "".into(), true)
                    .await;
                result?;
            }
            host::POWER_ON => {
                let on = switch(key, &value)?;
                self.reconciler.wait_for_power(on).await?;
            }
            host::POWER_OFF => {
                if switch(key, &value)? {
                    self.reconciler.wait_for_power(false).await?;
                }
            }
            host::POWER_CHECK => self.reconciler.recheck(),
            host::PAIRING_PIN => {
                let pin = value.to_string();
                if !pin.trim().is_empty() {
                    self.controller.submit_pin(&pin).await?;
                }
            }
            _ if key.starts_with("keys.") => {
                let command = keys::from_state_key(key).ok_or_else(|| {
                    DispatchError::UnknownCommand {
                        name: key.to_owned(),
                    }
                })?;
                if switch(key, &value)? {
                    self.dispatcher.send(command).await?;
                    self.host.publish_state(key, false.into(), true).await;
                }
            }
            _ => {
                return Err(CoreError::InvalidValue {
                    key: key.to_owned(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Stop every background task and wait for them to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                debug!(error = %e, "bridge task ended abnormally");
            }
        }
    }
}

fn switch(key: &str, value: &StateValue) -> Result<bool, CoreError> {
    value.as_bool().ok_or_else(|| CoreError::InvalidValue {
        key: key.to_owned(),
        value: value.to_string(),
    })
}
