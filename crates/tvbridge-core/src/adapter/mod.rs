// ── Protocol adapters ──
//
// One adapter per vendor protocol behind a common capability contract. The
// controller builds a fresh adapter for every connection attempt through an
// `AdapterFactory`, and adapters report lifecycle changes back over an
// explicit channel rather than through callbacks.

mod generic;
mod legacy;
mod pin;
mod token;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tvbridge_api::TransportConfig;

use crate::config::{Credentials, DeviceConfig, ProtocolVariant};
use crate::error::{ConnectError, PairError, SendError};
use crate::host::Learned;

pub use generic::GenericAdapter;
pub use legacy::LegacyAdapter;
pub use pin::PinPairingAdapter;
pub use token::TokenAdapter;

// ── Capability contract ──────────────────────────────────────────────

/// Result of a successful `connect`: values the host should persist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub learned: Vec<Learned>,
}

/// The key codes a variant uses to wake the TV and to turn it off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerKeys {
    pub on: &'static str,
    pub off: &'static str,
}

impl PowerKeys {
    pub fn for_direction(self, on: bool) -> &'static str {
        if on { self.on } else { self.off }
    }
}

/// A PIN challenge shown on the TV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingChallenge {
    pub issued_at: DateTime<Utc>,
}

/// Pairing state held by a PIN adapter while the operator reads the PIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingSession {
    pub challenge_issued_at: DateTime<Utc>,
    /// Last PIN tried, if any.
    pub pin: Option<String>,
}

/// Capability set every protocol variant provides.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    fn variant(&self) -> ProtocolVariant;

    /// Establish the transport-level session.
    async fn connect(&mut self) -> Result<Session, ConnectError>;

    /// Whether `connect` needs a PIN confirmed first.
    fn requires_pairing(&self) -> bool {
        false
    }

    /// Ask the TV to display a PIN.
    async fn request_pairing(&mut self) -> Result<PairingChallenge, PairError> {
        Err(PairError::NotPairing)
    }

    /// Submit the PIN the operator read off the TV.
    async fn confirm_pairing(&mut self, _pin: &str) -> Result<(), PairError> {
        Err(PairError::NotPairing)
    }

    /// Send one key press. Not idempotent.
    async fn send_key(&self, code: &str) -> Result<(), SendError>;

    fn power_keys(&self) -> PowerKeys;

    /// Map a key code to what this variant actually sends.
    fn translate_key<'a>(&self, code: &'a str) -> &'a str {
        code
    }

    /// Tear the session down. Must not emit a `Disconnected` event.
    async fn disconnect(&self) {}
}

// ── Lifecycle notifications ──────────────────────────────────────────

/// Connection lifecycle as reported by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connecting,
    Connected,
    Disconnected { reason: String },
}

/// A lifecycle event tagged with the attempt that produced it, so events
/// from replaced adapters can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleNotice {
    pub generation: u64,
    pub event: LifecycleEvent,
}

/// Observer handed to each adapter, one method per event.
#[derive(Debug, Clone)]
pub struct LifecycleSender {
    generation: u64,
    tx: mpsc::UnboundedSender<LifecycleNotice>,
}

impl LifecycleSender {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<LifecycleNotice>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connecting(&self) {
        self.emit(LifecycleEvent::Connecting);
    }

    pub fn connected(&self) {
        self.emit(LifecycleEvent::Connected);
    }

    pub fn disconnected(&self, reason: impl Into<String>) {
        self.emit(LifecycleEvent::Disconnected {
            reason: reason.into(),
        });
    }

    fn emit(&self, event: LifecycleEvent) {
        // The controller may already be gone during shutdown.
        let _ = self.tx.send(LifecycleNotice {
            generation: self.generation,
            event,
        });
    }
}

// ── Factory ──────────────────────────────────────────────────────────

/// Builds one adapter per connection attempt.
pub trait AdapterFactory: Send + Sync + 'static {
    fn variant(&self) -> ProtocolVariant;

    fn create(&self, events: LifecycleSender) -> Box<dyn ProtocolAdapter>;
}

/// Credentials learned at runtime, shared by every adapter a factory
/// builds so a reconnect reuses what the previous session learned.
#[derive(Debug, Default)]
pub(crate) struct CredentialCache {
    token: Mutex<Option<String>>,
    pin: Mutex<Option<String>>,
    model_2016: Mutex<Option<bool>>,
}

impl CredentialCache {
    fn from_config(config: &DeviceConfig) -> Self {
        use secrecy::ExposeSecret;

        let cache = Self::default();
        match &config.credentials {
            Credentials::Token(t) => cache.set_token(Some(t.expose_secret().to_owned())),
            Credentials::Pin(p) => cache.set_pin(Some(p.expose_secret().to_owned())),
            Credentials::None => {}
        }
        if let Ok(mut model) = cache.model_2016.lock() {
            *model = config.model_2016;
        }
        cache
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    pub(crate) fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = token;
        }
    }

    pub(crate) fn pin(&self) -> Option<String> {
        self.pin.lock().ok().and_then(|p| p.clone())
    }

    pub(crate) fn set_pin(&self, pin: Option<String>) {
        if let Ok(mut slot) = self.pin.lock() {
            *slot = pin;
        }
    }

    pub(crate) fn model_2016(&self) -> Option<bool> {
        self.model_2016.lock().ok().and_then(|m| *m)
    }

    pub(crate) fn set_model_2016(&self, detected: bool) {
        if let Ok(mut slot) = self.model_2016.lock() {
            *slot = Some(detected);
        }
    }
}

/// Factory for the real wire adapters, selected by `DeviceConfig::variant`.
pub struct DefaultAdapterFactory {
    config: DeviceConfig,
    transport: TransportConfig,
    cache: Arc<CredentialCache>,
    device_id: String,
}

impl DefaultAdapterFactory {
    pub fn new(config: DeviceConfig) -> Self {
        let transport = TransportConfig {
            timeout: config.connect_timeout,
            accept_invalid_certs: true,
        };
        let cache = Arc::new(CredentialCache::from_config(&config));
        Self {
            config,
            transport,
            cache,
            device_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl AdapterFactory for DefaultAdapterFactory {
    fn variant(&self) -> ProtocolVariant {
        self.config.variant
    }

    fn create(&self, events: LifecycleSender) -> Box<dyn ProtocolAdapter> {
        let config = &self.config;
        match config.variant {
            ProtocolVariant::Legacy => Box::new(LegacyAdapter::new(
                config,
                self.transport.clone(),
                Arc::clone(&self.cache),
                events,
            )),
            ProtocolVariant::Token => Box::new(TokenAdapter::new(
                config,
                self.transport.clone(),
                Arc::clone(&self.cache),
                events,
            )),
            ProtocolVariant::Pin => Box::new(PinPairingAdapter::new(
                config,
                &self.device_id,
                self.transport.clone(),
                Arc::clone(&self.cache),
                events,
            )),
            ProtocolVariant::Generic => Box::new(GenericAdapter::new(
                config,
                self.transport.clone(),
                events,
            )),
        }
    }
}
