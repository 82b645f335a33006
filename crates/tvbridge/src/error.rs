//! CLI error types with miette diagnostics.
//!
//! Maps engine and config errors into user-facing errors with actionable
//! help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use tvbridge_config::ConfigError;
use tvbridge_core::{ConnectError, CoreError, DispatchError, PairError, PowerError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("No session with the TV at {address}")]
    #[diagnostic(
        code(tvbridge::not_connected),
        help(
            "Check that the TV is on and reachable.\n\
             Try: tvbridge status --address {address}"
        )
    )]
    NotConnected { address: String },

    #[error("The TV at {address} did not accept a session within {seconds}s")]
    #[diagnostic(
        code(tvbridge::connect_timeout),
        help(
            "Accept the remote on the TV's prompt, or wait longer with --wait.\n\
             Run with -v to follow the connection attempts."
        )
    )]
    ConnectTimeout { address: String, seconds: u64 },

    #[error("Could not connect to the TV: {message}")]
    #[diagnostic(code(tvbridge::connection_failed))]
    ConnectionFailed { message: String },

    #[error("Power request failed: {message}")]
    #[diagnostic(
        code(tvbridge::power),
        help("A TV that is fully off can only be woken with a configured MAC address (--mac).")
    )]
    Power { message: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("The TV wants a PIN but no terminal is attached")]
    #[diagnostic(
        code(tvbridge::pairing_required),
        help(
            "Run the command interactively once to enter the PIN shown on the TV,\n\
             or set TVBRIDGE_PIN."
        )
    )]
    PairingRequired,

    #[error("Pairing failed: {message}")]
    #[diagnostic(code(tvbridge::pairing_failed))]
    PairingFailed { message: String },

    // ── Commands ─────────────────────────────────────────────────────

    #[error("Unknown key '{name}'")]
    #[diagnostic(
        code(tvbridge::unknown_key),
        help("Run: tvbridge keys to see available keys")
    )]
    UnknownKey { name: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tvbridge::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(tvbridge::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: tvbridge config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No TV configured")]
    #[diagnostic(
        code(tvbridge::no_config),
        help(
            "Create a profile with: tvbridge config init\n\
             Or pass --address. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(tvbridge::config))]
    Config(Box<figment::Error>),

    #[error(transparent)]
    #[diagnostic(code(tvbridge::config_file))]
    ConfigFile(Box<ConfigError>),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not encode output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotConnected { .. } | Self::ConnectionFailed { .. } | Self::Power { .. } => {
                exit_code::CONNECTION
            }
            Self::ConnectTimeout { .. } => exit_code::TIMEOUT,
            Self::PairingRequired | Self::PairingFailed { .. } => exit_code::AUTH,
            Self::UnknownKey { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::NOT_FOUND
            }
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

// ── Engine / config → CliError mapping ───────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            ConfigError::Figment(e) => Self::Config(e),
            ConfigError::Io(e) => Self::Io(e),
            other => Self::ConfigFile(Box::new(other)),
        }
    }
}

impl From<DispatchError> for CliError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnknownCommand { name } => Self::UnknownKey { name },
            DispatchError::EmptyCommand => Self::Validation {
                field: "key".into(),
                reason: "key name cannot be empty".into(),
            },
            DispatchError::NotConnected => Self::NotConnected {
                address: "(configured TV)".into(),
            },
            DispatchError::Send(e) => Self::ConnectionFailed {
                message: e.to_string(),
            },
        }
    }
}

impl From<PowerError> for CliError {
    fn from(err: PowerError) -> Self {
        Self::Power {
            message: err.to_string(),
        }
    }
}

impl From<PairError> for CliError {
    fn from(err: PairError) -> Self {
        Self::PairingFailed {
            message: err.to_string(),
        }
    }
}

impl From<ConnectError> for CliError {
    fn from(err: ConnectError) -> Self {
        Self::ConnectionFailed {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingAddress => Self::Validation {
                field: "address".into(),
                reason: "no TV address configured".into(),
            },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::InvalidValue { key, value } => Self::Validation {
                field: key,
                reason: format!("unsupported value '{value}'"),
            },
            CoreError::Connect(e) => e.into(),
            CoreError::Pair(e) => e.into(),
            CoreError::Dispatch(e) => e.into(),
            CoreError::Power(e) => e.into(),
            CoreError::ControllerStopped => Self::ConnectionFailed {
                message: "connection controller stopped".into(),
            },
        }
    }
}
