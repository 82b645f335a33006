// PIN-pairing adapter (H/J series).
//
// A fresh TV needs a PIN challenge/response before the command channel
// opens. Once a PIN is accepted it is cached, so reconnects pair silently.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use tvbridge_api::{PairedChannel, PairedSession, PairingClient, PairingIdentity, TransportConfig};

use super::{
    CredentialCache, LifecycleSender, PairingChallenge, PairingSession, PowerKeys,
    ProtocolAdapter, Session,
};
use crate::config::{DeviceConfig, ProtocolVariant};
use crate::error::{ConnectError, PairError, SendError};
use crate::host::Learned;

const POWER_KEYS: PowerKeys = PowerKeys {
    on: "KEY_POWER",
    off: "KEY_POWER",
};

const APP_ID: &str = "12345";

pub struct PinPairingAdapter {
    address: String,
    identity: PairingIdentity,
    transport: TransportConfig,
    cache: Arc<CredentialCache>,
    events: LifecycleSender,
    client: Option<PairingClient>,
    pairing: Option<PairingSession>,
    paired: Option<PairedSession>,
    channel: Option<PairedChannel>,
    watcher: Option<JoinHandle<()>>,
    learned: Vec<Learned>,
}

impl PinPairingAdapter {
    pub(crate) fn new(
        config: &DeviceConfig,
        device_id: &str,
        transport: TransportConfig,
        cache: Arc<CredentialCache>,
        events: LifecycleSender,
    ) -> Self {
        Self {
            address: config.address.clone(),
            identity: PairingIdentity {
                app_id: APP_ID.into(),
                device_id: device_id.to_owned(),
            },
            transport,
            cache,
            events,
            client: None,
            pairing: None,
            paired: None,
            channel: None,
            watcher: None,
            learned: Vec::new(),
        }
    }

    /// The pairing client, built on first use.
    fn client(&mut self) -> Result<&PairingClient, tvbridge_api::Error> {
        if self.client.is_none() {
            self.client = Some(PairingClient::new(
                &self.address,
                tvbridge_api::pairing::DEFAULT_PAIRING_PORT,
                tvbridge_api::pairing::DEFAULT_SESSION_PORT,
                self.identity.clone(),
                self.transport.clone(),
            )?);
        }
        self.client.as_ref().ok_or(tvbridge_api::Error::NotPaired)
    }

    /// Pair with a PIN accepted in an earlier session.
    async fn pair_with_cached_pin(&mut self, pin: String) -> Result<PairedSession, ConnectError> {
        let client = self.client()?.clone();
        client.start().await?;
        match client.confirm_pin(&pin).await {
            Ok(session) => Ok(session),
            Err(tvbridge_api::Error::WrongPin) => {
                tracing::warn!("stored PIN was rejected, a new pairing is required");
                self.cache.set_pin(None);
                Err(ConnectError::Rejected("stored PIN was not accepted".into()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ProtocolAdapter for PinPairingAdapter {
    fn variant(&self) -> ProtocolVariant {
        ProtocolVariant::Pin
    }

    async fn connect(&mut self) -> Result<Session, ConnectError> {
        self.events.connecting();

        let paired = match self.paired.clone() {
            Some(paired) => paired,
            None => {
                let pin = self
                    .cache
                    .pin()
                    .ok_or_else(|| ConnectError::Protocol("no PIN confirmed yet".into()))?;
                self.pair_with_cached_pin(pin).await?
            }
        };
        self.paired = Some(paired.clone());

        let client = self.client()?.clone();
        let channel = client.open_channel(paired).await?;

        let closed = channel.channel().closed();
        let events = self.events.clone();
        self.watcher = Some(tokio::spawn(async move {
            closed.cancelled().await;
            events.disconnected("TV closed the paired channel");
        }));
        self.channel = Some(channel);

        self.events.connected();
        Ok(Session {
            learned: std::mem::take(&mut self.learned),
        })
    }

    fn requires_pairing(&self) -> bool {
        self.paired.is_none() && self.cache.pin().is_none()
    }

    async fn request_pairing(&mut self) -> Result<PairingChallenge, PairError> {
        let client = self.client()?.clone();
        client.start().await?;
        client.show_pin_page().await?;

        let issued_at = Utc::now();
        self.pairing = Some(PairingSession {
            challenge_issued_at: issued_at,
            pin: None,
        });
        tracing::info!("PIN shown on the TV, waiting for the operator");
        Ok(PairingChallenge { issued_at })
    }

    async fn confirm_pairing(&mut self, pin: &str) -> Result<(), PairError> {
        let Some(pairing) = self.pairing.as_mut() else {
            return Err(PairError::NotPairing);
        };
        pairing.pin = Some(pin.to_owned());

        let client = self.client()?.clone();
        let paired = client.confirm_pin(pin).await?;
        client.hide_pin_page().await;

        self.pairing = None;
        self.paired = Some(paired);
        self.cache.set_pin(Some(pin.to_owned()));
        self.learned.push(Learned::Pin(pin.to_owned()));
        tracing::info!("PIN accepted");
        Ok(())
    }

    async fn send_key(&self, code: &str) -> Result<(), SendError> {
        let channel = self.channel.as_ref().ok_or(SendError::SessionClosed)?;
        channel.send_key(self.translate_key(code)).await?;
        Ok(())
    }

    fn power_keys(&self) -> PowerKeys {
        POWER_KEYS
    }

    async fn disconnect(&self) {
        if let Some(watcher) = &self.watcher {
            watcher.abort();
        }
        if let Some(channel) = &self.channel {
            channel.channel().shutdown().await;
        }
    }
}

impl Drop for PinPairingAdapter {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}
