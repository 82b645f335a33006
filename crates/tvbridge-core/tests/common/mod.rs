// Shared fakes for the engine integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;

use tvbridge_core::adapter::{
    AdapterFactory, LifecycleSender, PairingChallenge, PowerKeys, ProtocolAdapter, Session,
};
use tvbridge_core::{
    Bridge, ConnectError, DeviceConfig, Learned, MemoryHost, PairError, ProtocolVariant,
    Reachability, SendError,
};

// ── Probe ────────────────────────────────────────────────────────────

/// Reachability controlled by the test.
#[derive(Default)]
pub struct FakeProbe {
    alive: AtomicBool,
    samples: AtomicUsize,
}

impl FakeProbe {
    pub fn new(alive: bool) -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicBool::new(alive),
            samples: AtomicUsize::new(0),
        })
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Current reachability without counting a sample.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reachability for FakeProbe {
    async fn probe(&self, _address: &str, _timeout: Duration) -> bool {
        self.samples.fetch_add(1, Ordering::SeqCst);
        self.alive.load(Ordering::SeqCst)
    }
}

// ── Adapter ──────────────────────────────────────────────────────────

/// How the next fake adapter behaves on `connect`.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail(ConnectError),
    /// Needs this PIN before connecting.
    RequirePin(String),
}

/// Everything the fakes observed, shared with the test.
#[derive(Default)]
pub struct Recorder {
    pub created: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub attempts_at: Mutex<Vec<Instant>>,
    pub sent: Mutex<Vec<String>>,
    pub disconnects: AtomicUsize,
    pub last_events: Mutex<Option<LifecycleSender>>,
}

impl Recorder {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts_at(&self) -> Vec<Instant> {
        self.attempts_at.lock().unwrap().clone()
    }

    /// Simulate the TV dropping the most recent session.
    pub fn drop_session(&self, reason: &str) {
        if let Some(events) = self.last_events.lock().unwrap().as_ref() {
            events.disconnected(reason);
        }
    }
}

pub struct FakeAdapter {
    behavior: Behavior,
    connect_delay: Duration,
    paired: bool,
    events: LifecycleSender,
    recorder: Arc<Recorder>,
    probe: Option<Arc<FakeProbe>>,
}

#[async_trait]
impl ProtocolAdapter for FakeAdapter {
    fn variant(&self) -> ProtocolVariant {
        ProtocolVariant::Token
    }

    async fn connect(&mut self) -> Result<Session, ConnectError> {
        let rec = &self.recorder;
        let now = rec.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        rec.max_in_flight.fetch_max(now, Ordering::SeqCst);
        rec.attempts_at.lock().unwrap().push(Instant::now());
        self.events.connecting();

        tokio::time::sleep(self.connect_delay).await;
        rec.in_flight.fetch_sub(1, Ordering::SeqCst);

        // A TV that does not answer cannot accept a session.
        if self.probe.as_ref().is_some_and(|p| !p.is_alive()) {
            return Err(ConnectError::Transport("no route to host".into()));
        }

        match &self.behavior {
            Behavior::Fail(e) => Err(e.clone()),
            Behavior::Succeed => {
                self.events.connected();
                Ok(Session::default())
            }
            Behavior::RequirePin(pin) => {
                self.events.connected();
                Ok(Session {
                    learned: vec![Learned::Pin(pin.clone())],
                })
            }
        }
    }

    fn requires_pairing(&self) -> bool {
        matches!(self.behavior, Behavior::RequirePin(_)) && !self.paired
    }

    async fn request_pairing(&mut self) -> Result<PairingChallenge, PairError> {
        Ok(PairingChallenge {
            issued_at: Utc::now(),
        })
    }

    async fn confirm_pairing(&mut self, pin: &str) -> Result<(), PairError> {
        match &self.behavior {
            Behavior::RequirePin(expected) if expected == pin => {
                self.paired = true;
                Ok(())
            }
            Behavior::RequirePin(_) => Err(PairError::WrongPin),
            _ => Err(PairError::NotPairing),
        }
    }

    async fn send_key(&self, code: &str) -> Result<(), SendError> {
        self.recorder.sent.lock().unwrap().push(code.to_owned());
        Ok(())
    }

    fn power_keys(&self) -> PowerKeys {
        PowerKeys {
            on: "KEY_POWER",
            off: "KEY_POWER",
        }
    }

    async fn disconnect(&self) {
        self.recorder.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out fake adapters; scripted behaviours are used in
/// order, then `fallback` for every later attempt.
pub struct FakeFactory {
    script: Mutex<VecDeque<Behavior>>,
    fallback: Behavior,
    connect_delay: Duration,
    probe: Mutex<Option<Arc<FakeProbe>>>,
    pub recorder: Arc<Recorder>,
}

impl FakeFactory {
    pub fn new(fallback: Behavior) -> Arc<Self> {
        Self::scripted(Vec::new(), fallback, Duration::ZERO)
    }

    pub fn scripted(script: Vec<Behavior>, fallback: Behavior, connect_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            connect_delay,
            probe: Mutex::new(None),
            recorder: Arc::new(Recorder::default()),
        })
    }

    /// Make adapters fail to connect while `probe` reports the TV dead.
    pub fn attach_probe(&self, probe: Arc<FakeProbe>) {
        *self.probe.lock().unwrap() = Some(probe);
    }
}

impl AdapterFactory for FakeFactory {
    fn variant(&self) -> ProtocolVariant {
        ProtocolVariant::Token
    }

    fn create(&self, events: LifecycleSender) -> Box<dyn ProtocolAdapter> {
        self.recorder.created.fetch_add(1, Ordering::SeqCst);
        *self.recorder.last_events.lock().unwrap() = Some(events.clone());
        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Box::new(FakeAdapter {
            behavior,
            connect_delay: self.connect_delay,
            paired: false,
            events,
            recorder: Arc::clone(&self.recorder),
            probe: self.probe.lock().unwrap().clone(),
        })
    }
}

// ── Harness ──────────────────────────────────────────────────────────

pub fn device_config() -> DeviceConfig {
    DeviceConfig::new("192.168.1.50", ProtocolVariant::Token)
}

pub struct Harness {
    pub bridge: Bridge,
    pub host: Arc<MemoryHost>,
    pub probe: Arc<FakeProbe>,
    pub factory: Arc<FakeFactory>,
}

impl Harness {
    pub fn start(alive: bool, factory: Arc<FakeFactory>) -> Self {
        Self::with_config(device_config(), alive, factory)
    }

    pub fn with_config(config: DeviceConfig, alive: bool, factory: Arc<FakeFactory>) -> Self {
        let host = Arc::new(MemoryHost::new());
        let probe = FakeProbe::new(alive);
        factory.attach_probe(probe.clone());
        let bridge = Bridge::start(
            config,
            host.clone(),
            factory.clone(),
            probe.clone(),
        )
        .unwrap();
        Self {
            bridge,
            host,
            probe,
            factory,
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.factory.recorder
    }
}

/// Poll `cond` on the (paused) clock until it holds or `limit` passes.
pub async fn eventually(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
