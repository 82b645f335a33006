// Generic adapter: stateless TCP remote, one connection per key press.

use async_trait::async_trait;
use tvbridge_api::{RemoteClient, RemoteIdentity, TransportConfig};

use super::{LifecycleSender, PowerKeys, ProtocolAdapter, Session};
use crate::config::{DeviceConfig, ProtocolVariant};
use crate::error::{ConnectError, SendError};

const POWER_KEYS: PowerKeys = PowerKeys {
    on: "KEY_POWEROFF",
    off: "KEY_POWEROFF",
};

pub struct GenericAdapter {
    client: RemoteClient,
    events: LifecycleSender,
}

impl GenericAdapter {
    pub(crate) fn new(
        config: &DeviceConfig,
        transport: TransportConfig,
        events: LifecycleSender,
    ) -> Self {
        let identity = RemoteIdentity {
            name: config.app_name.clone(),
            client_ip: "127.0.0.1".into(),
            client_mac: "00-00-00-00-00-00".into(),
        };
        Self {
            client: RemoteClient::new(
                &config.address,
                tvbridge_api::remote::DEFAULT_PORT,
                identity,
                transport,
            ),
            events,
        }
    }
}

#[async_trait]
impl ProtocolAdapter for GenericAdapter {
    fn variant(&self) -> ProtocolVariant {
        ProtocolVariant::Generic
    }

    /// Nothing to hold open: every key press authenticates on its own.
    async fn connect(&mut self) -> Result<Session, ConnectError> {
        self.events.connecting();
        self.events.connected();
        Ok(Session::default())
    }

    async fn send_key(&self, code: &str) -> Result<(), SendError> {
        self.client.send_key(self.translate_key(code)).await?;
        Ok(())
    }

    fn power_keys(&self) -> PowerKeys {
        POWER_KEYS
    }
}
