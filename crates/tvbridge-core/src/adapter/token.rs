// Token adapter: persistent secure channel, token reused across sessions.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tvbridge_api::{TokenClient, TokenSession, TransportConfig};

use super::{CredentialCache, LifecycleSender, PowerKeys, ProtocolAdapter, Session};
use crate::config::{DeviceConfig, ProtocolVariant};
use crate::error::{ConnectError, SendError};
use crate::host::Learned;

const POWER_KEYS: PowerKeys = PowerKeys {
    on: "KEY_POWER",
    off: "KEY_POWER",
};

pub struct TokenAdapter {
    client: TokenClient,
    cache: Arc<CredentialCache>,
    events: LifecycleSender,
    session: Option<TokenSession>,
    watcher: Option<JoinHandle<()>>,
}

impl TokenAdapter {
    pub(crate) fn new(
        config: &DeviceConfig,
        transport: TransportConfig,
        cache: Arc<CredentialCache>,
        events: LifecycleSender,
    ) -> Self {
        Self {
            client: TokenClient::new(
                &config.address,
                tvbridge_api::token::DEFAULT_PORT,
                &config.app_name,
                transport,
            ),
            cache,
            events,
            session: None,
            watcher: None,
        }
    }
}

#[async_trait]
impl ProtocolAdapter for TokenAdapter {
    fn variant(&self) -> ProtocolVariant {
        ProtocolVariant::Token
    }

    async fn connect(&mut self) -> Result<Session, ConnectError> {
        self.events.connecting();
        let known = self.cache.token();
        if known.is_none() {
            tracing::info!("no token yet, allow the remote on the TV when prompted");
        }

        let session = self.client.connect(known.as_deref()).await?;

        let mut learned = Session::default();
        if let Some(token) = session.issued_token.clone() {
            tracing::info!(token = %token, "TV issued a remote token, it will be reused on reconnect");
            self.cache.set_token(Some(token.clone()));
            learned.learned.push(Learned::Token(token));
        }

        let closed = session.channel().closed();
        let events = self.events.clone();
        self.watcher = Some(tokio::spawn(async move {
            closed.cancelled().await;
            events.disconnected("TV closed the secure channel");
        }));
        self.session = Some(session);

        self.events.connected();
        Ok(learned)
    }

    async fn send_key(&self, code: &str) -> Result<(), SendError> {
        let session = self.session.as_ref().ok_or(SendError::SessionClosed)?;
        session.send_key(self.translate_key(code)).await?;
        Ok(())
    }

    fn power_keys(&self) -> PowerKeys {
        POWER_KEYS
    }

    async fn disconnect(&self) {
        if let Some(watcher) = &self.watcher {
            watcher.abort();
        }
        if let Some(session) = &self.session {
            session.channel().shutdown().await;
        }
    }
}

impl Drop for TokenAdapter {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}
