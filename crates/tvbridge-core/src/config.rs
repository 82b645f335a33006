// ── Runtime device configuration ──
//
// These types describe *which* TV to talk to and how patiently. They carry
// credentials and timing knobs but never touch disk: the config crate (or a
// test) builds a `DeviceConfig` and hands it to the bridge.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tvbridge_api::MacAddr;

use crate::error::CoreError;

/// Which vendor remote-control protocol the TV speaks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProtocolVariant {
    /// 2016-series WebSocket channel (port 8001).
    #[strum(to_string = "legacy", serialize = "2016")]
    Legacy,
    /// Token-authenticated secure channel (port 8002).
    #[strum(to_string = "token", serialize = "tizen")]
    Token,
    /// H/J-series PIN pairing.
    #[strum(to_string = "pin", serialize = "hj")]
    Pin,
    /// Pre-2014 TCP remote (port 55000).
    #[strum(to_string = "generic", serialize = "remote")]
    Generic,
}

impl ProtocolVariant {
    /// Ports probed for reachability when none are configured.
    ///
    /// A refused connection counts as alive, so any port the TV's network
    /// stack answers on works; the primary remote port comes first.
    pub fn default_probe_ports(self) -> Vec<u16> {
        let primary = match self {
            Self::Legacy => tvbridge_api::legacy::DEFAULT_PORT,
            Self::Token => tvbridge_api::token::DEFAULT_PORT,
            Self::Pin => tvbridge_api::pairing::DEFAULT_PAIRING_PORT,
            Self::Generic => tvbridge_api::remote::DEFAULT_PORT,
        };
        vec![primary, 9197]
    }
}

/// Credentials a variant may need.
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    #[default]
    None,
    /// Token issued by a token-authenticated TV on first allow.
    Token(SecretString),
    /// PIN for a PIN-pairing TV.
    Pin(SecretString),
}

pub const DEFAULT_APP_NAME: &str = "tvbridge";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_IMMEDIATE_RETRIES: u32 = 5;
pub const DEFAULT_PROBE_INTERVAL_MIN: Duration = Duration::from_secs(1);
pub const DEFAULT_PROBE_INTERVAL_MAX: Duration = Duration::from_secs(15);
pub const DEFAULT_CONFIRM_SAMPLES: u32 = 3;
pub const DEFAULT_POWER_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_POWER_POLL_ATTEMPTS: u32 = 20;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for one TV. Read-only once the bridge starts.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// IP address or host name of the TV.
    pub address: String,
    pub variant: ProtocolVariant,
    pub credentials: Credentials,
    /// Hardware address, used for Wake-on-LAN.
    pub mac: Option<MacAddr>,
    /// Name the remote announces itself with on the TV.
    pub app_name: String,
    /// TCP ports used by the reachability probe.
    pub probe_ports: Vec<u16>,
    pub probe_timeout: Duration,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Failures after which retry logging escalates from info to error.
    pub max_immediate_retries: u32,
    pub probe_interval_min: Duration,
    pub probe_interval_max: Duration,
    /// Consecutive identical samples before the power state is confirmed.
    pub confirm_samples: u32,
    pub power_poll_interval: Duration,
    pub power_poll_attempts: u32,
    /// Bound for a single connect / handshake / key exchange.
    pub connect_timeout: Duration,
    /// Cached result of 2016-model detection (`None` = not detected yet).
    pub model_2016: Option<bool>,
}

impl DeviceConfig {
    /// A configuration with default timing for the TV at `address`.
    pub fn new(address: impl Into<String>, variant: ProtocolVariant) -> Self {
        Self {
            address: address.into(),
            variant,
            credentials: Credentials::None,
            mac: None,
            app_name: DEFAULT_APP_NAME.into(),
            probe_ports: variant.default_probe_ports(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_immediate_retries: DEFAULT_MAX_IMMEDIATE_RETRIES,
            probe_interval_min: DEFAULT_PROBE_INTERVAL_MIN,
            probe_interval_max: DEFAULT_PROBE_INTERVAL_MAX,
            confirm_samples: DEFAULT_CONFIRM_SAMPLES,
            power_poll_interval: DEFAULT_POWER_POLL_INTERVAL,
            power_poll_attempts: DEFAULT_POWER_POLL_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            model_2016: None,
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.address.trim().is_empty() {
            return Err(CoreError::MissingAddress);
        }
        if self.probe_ports.is_empty() {
            return Err(CoreError::Config {
                message: "at least one probe port is required".into(),
            });
        }
        if self.probe_interval_min.is_zero() || self.probe_interval_min > self.probe_interval_max
        {
            return Err(CoreError::Config {
                message: "probe interval bounds must satisfy 0 < min <= max".into(),
            });
        }
        if self.confirm_samples == 0 {
            return Err(CoreError::Config {
                message: "confirm_samples must be at least 1".into(),
            });
        }
        Ok(())
    }
}
