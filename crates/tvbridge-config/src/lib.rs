//! Shared configuration for the `tvbridge` binary.
//!
//! TOML profiles (one per TV), environment overrides, credential
//! resolution (env + keyring + plaintext), translation to
//! `tvbridge_core::DeviceConfig`, and write-back of values the TV hands
//! out at runtime (tokens, accepted PINs, model detection).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tvbridge_core::{Credentials, DeviceConfig, Learned, MacAddr, ProtocolVariant};

const KEYRING_SERVICE: &str = "tvbridge";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("profile '{profile}' has no TV address")]
    MissingAddress { profile: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named TV profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Seconds allowed for one connect, handshake or key exchange.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    5
}

/// One TV.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// IP address or host name of the TV.
    #[serde(default)]
    pub address: String,

    /// "legacy", "token", "pin" or "generic" (aliases "2016", "tizen",
    /// "hj", "remote").
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Hardware address for Wake-on-LAN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,

    /// Name shown on the TV's allow prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    /// Remote token (plaintext; prefer keyring or env var).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable holding the remote token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Pairing PIN (plaintext; prefer keyring).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_ports: Option<Vec<u16>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_timeout_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect_delay_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_immediate_retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_poll_attempts: Option<u32>,

    /// Override `defaults.timeout`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Cached 2016-model detection, written back after the first probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_2016: Option<bool>,
}

fn default_protocol() -> String {
    "token".into()
}

impl Profile {
    pub fn variant(&self) -> Result<ProtocolVariant, ConfigError> {
        self.protocol
            .parse()
            .map_err(|_| ConfigError::Validation {
                field: "protocol".into(),
                reason: format!(
                    "expected 'legacy', 'token', 'pin' or 'generic', got '{}'",
                    self.protocol
                ),
            })
    }

    /// Record a value learned from the TV. Returns whether anything changed.
    pub fn apply_learned(&mut self, learned: &Learned) -> bool {
        match learned {
            Learned::Token(token) => replace(&mut self.token, token.clone()),
            Learned::Pin(pin) => replace(&mut self.pin, pin.clone()),
            Learned::Model2016(flag) => replace(&mut self.model_2016, *flag),
        }
    }
}

fn replace<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        return false;
    }
    *slot = Some(value);
    true
}

impl Config {
    /// Name of the profile to use: explicit choice, then `default_profile`.
    pub fn profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "tvbridge", "tvbridge").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tvbridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment keys use a double underscore for nesting, e.g.
/// `TVBRIDGE_PROFILES__LIVING__ADDRESS`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TVBRIDGE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_secret(profile_name: &str, kind: &str) -> Option<SecretString> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{kind}")).ok()?;
    entry.get_password().ok().map(SecretString::from)
}

/// Store a secret in the system keyring. Returns false when no keyring
/// backend is usable.
pub fn store_in_keyring(profile_name: &str, kind: &str, secret: &str) -> bool {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{kind}"))
        .and_then(|entry| entry.set_password(secret))
        .is_ok()
}

/// Resolve the remote token: `token_env`, then keyring, then plaintext.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(val) = profile
        .token_env
        .as_ref()
        .and_then(|env_name| std::env::var(env_name).ok())
    {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Some(secret) = keyring_secret(profile_name, "token") {
        return Ok(secret);
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve the pairing PIN: `TVBRIDGE_PIN`, then keyring, then plaintext.
pub fn resolve_pin(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Ok(pin) = std::env::var("TVBRIDGE_PIN") {
        return Ok(SecretString::from(pin));
    }
    if let Some(secret) = keyring_secret(profile_name, "pin") {
        return Ok(secret);
    }
    if let Some(ref pin) = profile.pin {
        return Ok(SecretString::from(pin.clone()));
    }
    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Credentials for the profile's protocol. A TV that has never been
/// paired legitimately has none; it prompts on first connect.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
    variant: ProtocolVariant,
) -> Result<Credentials, ConfigError> {
    let resolved = match variant {
        ProtocolVariant::Token => resolve_token(profile, profile_name).map(Credentials::Token),
        ProtocolVariant::Pin => resolve_pin(profile, profile_name).map(Credentials::Pin),
        ProtocolVariant::Legacy | ProtocolVariant::Generic => Ok(Credentials::None),
    };
    match resolved {
        Err(ConfigError::NoCredentials { .. }) => Ok(Credentials::None),
        other => other,
    }
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `DeviceConfig` from a profile, filling unset knobs with the
/// engine defaults.
pub fn profile_to_device_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<DeviceConfig, ConfigError> {
    if profile.address.trim().is_empty() {
        return Err(ConfigError::MissingAddress {
            profile: profile_name.into(),
        });
    }
    let variant = profile.variant()?;
    let mut config = DeviceConfig::new(profile.address.trim(), variant);

    config.credentials = resolve_credentials(profile, profile_name, variant)?;
    config.mac = profile
        .mac
        .as_deref()
        .map(|mac| {
            mac.parse::<MacAddr>().map_err(|_| ConfigError::Validation {
                field: "mac".into(),
                reason: format!("'{mac}' is not a hardware address"),
            })
        })
        .transpose()?;
    if let Some(ref name) = profile.app_name {
        config.app_name.clone_from(name);
    }
    if let Some(ref ports) = profile.probe_ports {
        if ports.is_empty() {
            return Err(ConfigError::Validation {
                field: "probe_ports".into(),
                reason: "must list at least one port".into(),
            });
        }
        config.probe_ports.clone_from(ports);
    }
    if let Some(ms) = profile.probe_timeout_ms {
        config.probe_timeout = Duration::from_millis(ms);
    }
    if let Some(secs) = profile.reconnect_delay_secs {
        config.reconnect_delay = Duration::from_secs(secs);
    }
    if let Some(n) = profile.max_immediate_retries {
        config.max_immediate_retries = n;
    }
    if let Some(n) = profile.power_poll_attempts {
        config.power_poll_attempts = n;
    }
    config.connect_timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.model_2016 = profile.model_2016;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(address: &str, protocol: &str) -> Profile {
        Profile {
            address: address.into(),
            protocol: protocol.into(),
            ..Profile::default()
        }
    }

    #[test]
    fn learned_values_only_report_real_changes() {
        let mut p = profile("10.0.0.5", "token");
        assert!(p.apply_learned(&Learned::Token("abc".into())));
        assert!(!p.apply_learned(&Learned::Token("abc".into())));
        assert!(p.apply_learned(&Learned::Model2016(true)));
        assert_eq!(p.token.as_deref(), Some("abc"));
        assert_eq!(p.model_2016, Some(true));
    }

    #[test]
    fn unknown_protocol_is_a_validation_error() {
        let p = profile("10.0.0.5", "infrared");
        let err = p.variant().expect_err("should fail");
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "protocol"));
    }

    #[test]
    fn blank_address_is_missing() {
        let p = profile("   ", "legacy");
        let err = profile_to_device_config(&p, "tv", &Defaults::default()).expect_err("no address");
        assert!(matches!(err, ConfigError::MissingAddress { .. }));
    }

    #[test]
    fn profile_name_falls_back_to_default() {
        let cfg = Config::default();
        assert_eq!(cfg.profile_name(None), "default");
        assert_eq!(cfg.profile_name(Some("den")), "den");
    }
}
