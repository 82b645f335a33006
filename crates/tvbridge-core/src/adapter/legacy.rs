// 2016-series adapter: one WebSocket per key press.

use std::sync::Arc;

use async_trait::async_trait;
use tvbridge_api::{LegacyClient, TransportConfig};

use super::{CredentialCache, LifecycleSender, PowerKeys, ProtocolAdapter, Session};
use crate::config::{DeviceConfig, ProtocolVariant};
use crate::error::{ConnectError, SendError};
use crate::host::Learned;

/// On these models the power toggle is `KEY_POWER` in both directions.
const POWER_KEYS: PowerKeys = PowerKeys {
    on: "KEY_POWER",
    off: "KEY_POWER",
};

pub struct LegacyAdapter {
    address: String,
    app_name: String,
    transport: TransportConfig,
    cache: Arc<CredentialCache>,
    events: LifecycleSender,
    client: Option<LegacyClient>,
}

impl LegacyAdapter {
    pub(crate) fn new(
        config: &DeviceConfig,
        transport: TransportConfig,
        cache: Arc<CredentialCache>,
        events: LifecycleSender,
    ) -> Self {
        Self {
            address: config.address.clone(),
            app_name: config.app_name.clone(),
            transport,
            cache,
            events,
            client: None,
        }
    }
}

#[async_trait]
impl ProtocolAdapter for LegacyAdapter {
    fn variant(&self) -> ProtocolVariant {
        ProtocolVariant::Legacy
    }

    async fn connect(&mut self) -> Result<Session, ConnectError> {
        self.events.connecting();
        let client = LegacyClient::new(
            &self.address,
            tvbridge_api::legacy::DEFAULT_PORT,
            &self.app_name,
            self.transport.clone(),
        )?;

        // Opening an empty channel is the model check.
        client.probe().await?;

        let mut session = Session::default();
        if self.cache.model_2016() != Some(true) {
            tracing::info!(address = %self.address, "detected 2016-series TV");
            self.cache.set_model_2016(true);
            session.learned.push(Learned::Model2016(true));
        }

        self.client = Some(client);
        self.events.connected();
        Ok(session)
    }

    async fn send_key(&self, code: &str) -> Result<(), SendError> {
        let client = self.client.as_ref().ok_or(SendError::SessionClosed)?;
        client.send_key(self.translate_key(code)).await?;
        Ok(())
    }

    fn power_keys(&self) -> PowerKeys {
        POWER_KEYS
    }

    fn translate_key<'a>(&self, code: &'a str) -> &'a str {
        if code == "KEY_POWEROFF" {
            "KEY_POWER"
        } else {
            code
        }
    }
}
