// ── Core error types ──
//
// The engine's error taxonomy. Wire-level failures from `tvbridge-api`
// are folded into these by the `From` impls below, so callers never match
// on WebSocket close codes or HTTP statuses.

use thiserror::Error;

/// Session establishment failed. Drives the reconnect backoff.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Connection timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("TV refused the remote: {0}")]
    Rejected(String),

    #[error("Waiting for the remote to be allowed on the TV")]
    AwaitingApproval,

    #[error("TV does not speak this protocol: {0}")]
    UnsupportedModel(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ConnectError {
    /// Whether the next scheduled attempt has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::AwaitingApproval
        )
    }
}

/// PIN pairing failed. Reported to the operator, never retried automatically.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PairError {
    #[error("Incorrect PIN")]
    WrongPin,

    #[error("No pairing is in progress")]
    NotPairing,

    #[error("Pairing abandoned: {0}")]
    Abandoned(String),

    #[error("Pairing transport failure: {0}")]
    Transport(String),
}

/// A key press could not be delivered. Not retried: key presses are not
/// idempotent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Key press timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("TV refused the key press: {0}")]
    Rejected(String),

    #[error("Session is closed")]
    SessionClosed,
}

/// A named command could not be dispatched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    #[error("Not connected to the TV")]
    NotConnected,

    #[error(transparent)]
    Send(#[from] SendError),
}

/// A power request could not be carried out.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PowerError {
    #[error("Not connected to the TV and no MAC address configured for Wake-on-LAN")]
    NotConnected,

    #[error("Power key failed: {0}")]
    Send(#[from] SendError),

    #[error("Wake-on-LAN failed: {0}")]
    Wake(String),

    #[error("Superseded by a newer power request")]
    Superseded,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("No TV address configured")]
    MissingAddress,

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Engine errors ────────────────────────────────────────────────
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Pair(#[from] PairError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Power(#[from] PowerError),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Connection controller is not running")]
    ControllerStopped,
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tvbridge_api::Error> for ConnectError {
    fn from(err: tvbridge_api::Error) -> Self {
        use tvbridge_api::Error as Api;
        match err {
            Api::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            Api::Unauthorized => Self::Rejected("remote not allowed on the TV".into()),
            Api::WrongPin => Self::Rejected("stored PIN was not accepted".into()),
            Api::AwaitingApproval => Self::AwaitingApproval,
            Api::HandshakeRejected { message } => Self::UnsupportedModel(message),
            Api::Protocol { message } | Api::Deserialization { message, .. } => {
                Self::Protocol(message)
            }
            Api::NotPaired => Self::Protocol("no paired session".into()),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<tvbridge_api::Error> for PairError {
    fn from(err: tvbridge_api::Error) -> Self {
        use tvbridge_api::Error as Api;
        match err {
            Api::WrongPin | Api::Unauthorized => Self::WrongPin,
            Api::HandshakeRejected { message } | Api::Protocol { message } => {
                Self::Abandoned(message)
            }
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<tvbridge_api::Error> for SendError {
    fn from(err: tvbridge_api::Error) -> Self {
        use tvbridge_api::Error as Api;
        match err {
            Api::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            Api::Unauthorized | Api::AwaitingApproval => {
                Self::Rejected("remote not allowed on the TV".into())
            }
            Api::HandshakeRejected { message } => Self::Rejected(message),
            Api::WebSocketClosed { .. } => Self::SessionClosed,
            other => Self::Transport(other.to_string()),
        }
    }
}
