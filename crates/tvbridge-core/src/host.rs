// ── Host platform seam ──
//
// The home-automation host that stores states, receives learned values and
// delivers user commands. The engine only talks to it through
// `HostPlatform`; `MemoryHost` is the in-process implementation used by the
// binary and by tests.

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const UPDATE_CHANNEL_SIZE: usize = 256;

// ── State keys ───────────────────────────────────────────────────────

pub const POWER_ON: &str = "power.on";
pub const POWER_OFF: &str = "power.off";
pub const POWER_CHECK: &str = "power.checkOnOff";
pub const CONNECTED: &str = "connection.connected";
pub const PAIRING_REQUIRED: &str = "connection.pairingRequired";
pub const PAIRING_PIN: &str = "pairing.pin";
pub const COMMAND: &str = "command";

/// A host state value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Text(String),
}

impl StateValue {
    /// Interpret the value as a switch. Text accepts the usual spellings.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "1" | "yes" => Some(true),
                "false" | "off" | "0" | "no" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// A value the engine learned at runtime that must survive restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Learned {
    /// Token issued by a token-authenticated TV.
    Token(String),
    /// Result of 2016-model detection.
    Model2016(bool),
    /// PIN accepted by a PIN-pairing TV.
    Pin(String),
}

/// One published state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub key: String,
    pub value: StateValue,
    pub ack: bool,
}

/// Operations the engine needs from its host.
///
/// Implementations must not fail loudly: a host that cannot store a value
/// logs and carries on.
#[async_trait]
pub trait HostPlatform: Send + Sync + 'static {
    /// Set a state. `ack` marks values confirmed by the device.
    async fn publish_state(&self, key: &str, value: StateValue, ack: bool);

    /// Current value of a state, if set.
    async fn get_state(&self, key: &str) -> Option<StateValue>;

    /// Store a learned value in the device configuration.
    async fn persist(&self, learned: Learned);
}

// ── MemoryHost ───────────────────────────────────────────────────────

/// In-process host: states in a `DashMap`, changes fanned out on a
/// broadcast channel and kept in an ordered log.
pub struct MemoryHost {
    states: DashMap<String, (StateValue, bool)>,
    history: Mutex<Vec<Published>>,
    learned: Mutex<Vec<Learned>>,
    updates: broadcast::Sender<Published>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);
        Self {
            states: DashMap::new(),
            history: Mutex::new(Vec::new()),
            learned: Mutex::new(Vec::new()),
            updates,
        }
    }

    /// Subscribe to state changes published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.updates.subscribe()
    }

    /// Current value without going through the async trait.
    pub fn state(&self, key: &str) -> Option<StateValue> {
        self.states.get(key).map(|entry| entry.value().0.clone())
    }

    /// Every value ever published under `key`, oldest first.
    pub fn history_of(&self, key: &str) -> Vec<StateValue> {
        self.history
            .lock()
            .map(|h| {
                h.iter()
                    .filter(|p| p.key == key)
                    .map(|p| p.value.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of all states, sorted by key.
    pub fn snapshot(&self) -> Vec<(String, StateValue)> {
        let mut all: Vec<_> = self
            .states
            .iter()
            .map(|e| (e.key().clone(), e.value().0.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Learned values handed to `persist`, oldest first.
    pub fn learned(&self) -> Vec<Learned> {
        self.learned.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HostPlatform for MemoryHost {
    async fn publish_state(&self, key: &str, value: StateValue, ack: bool) {
        tracing::trace!(key, %value, ack, "publish state");
        self.states.insert(key.to_owned(), (value.clone(), ack));
        let update = Published {
            key: key.to_owned(),
            value,
            ack,
        };
        if let Ok(mut history) = self.history.lock() {
            history.push(update.clone());
        }
        // No subscribers is fine.
        let _ = self.updates.send(update);
    }

    async fn get_state(&self, key: &str) -> Option<StateValue> {
        self.state(key)
    }

    async fn persist(&self, learned: Learned) {
        tracing::debug!(?learned, "persist learned value");
        if let Ok(mut all) = self.learned.lock() {
            all.push(learned);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_values_read_as_switches() {
        assert_eq!(StateValue::from("ON").as_bool(), Some(true));
        assert_eq!(StateValue::from("0").as_bool(), Some(false));
        assert_eq!(StateValue::from("maybe").as_bool(), None);
        assert_eq!(StateValue::Bool(true).as_text(), None);
    }

    #[tokio::test]
    async fn memory_host_records_history() {
        let host = MemoryHost::new();
        let mut rx = host.subscribe();
        host.publish_state(POWER_CHECK, "on".into(), true).await;
        host.publish_state(POWER_CHECK, "ON".into(), true).await;

        assert_eq!(host.state(POWER_CHECK), Some(StateValue::from("ON")));
        assert_eq!(
            host.history_of(POWER_CHECK),
            vec![StateValue::from("on"), StateValue::from("ON")]
        );
        assert_eq!(rx.recv().await.ok().map(|p| p.value), Some("on".into()));
    }
}
