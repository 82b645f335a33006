//! CLI configuration: thin wrapper around `tvbridge_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--address, --protocol, --mac, --token).

use secrecy::SecretString;

use tvbridge_core::{Credentials, DeviceConfig, MacAddr, ProtocolVariant};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use tvbridge_config::{
    Config, Defaults, Profile, config_path, load_config, load_config_or_default, save_config,
};

/// A resolved TV: the engine config plus the profile it came from, if any.
pub struct Resolved {
    pub device: DeviceConfig,
    pub profile_name: Option<String>,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref())
}

fn parse_variant(raw: &str) -> Result<ProtocolVariant, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "protocol".into(),
        reason: format!("expected 'legacy', 'token', 'pin' or 'generic', got '{raw}'"),
    })
}

fn parse_mac(raw: &str) -> Result<MacAddr, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "mac".into(),
        reason: format!("'{raw}' is not a hardware address"),
    })
}

/// Build the `DeviceConfig` for this invocation.
///
/// Flags override the profile; with no profile, `--address` alone is
/// enough to drive a TV.
pub fn resolve_device(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let (mut device, profile_name) = if let Some(profile) = cfg.profiles.get(&profile_name) {
        let mut profile = profile.clone();
        if let Some(ref address) = global.address {
            profile.address.clone_from(address);
        }
        if let Some(ref protocol) = global.protocol {
            profile.protocol.clone_from(protocol);
        }
        let device =
            tvbridge_config::profile_to_device_config(&profile, &profile_name, &cfg.defaults)?;
        (device, Some(profile_name))
    } else if let Some(ref address) = global.address {
        let variant = match global.protocol.as_deref() {
            Some(raw) => parse_variant(raw)?,
            None => ProtocolVariant::Token,
        };
        let mut device = DeviceConfig::new(address.trim(), variant);
        device.connect_timeout = std::time::Duration::from_secs(cfg.defaults.timeout);
        (device, None)
    } else if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(&cfg),
        });
    } else {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    };

    if let Some(ref mac) = global.mac {
        device.mac = Some(parse_mac(mac)?);
    }
    if let Some(ref token) = global.token {
        device.credentials = Credentials::Token(SecretString::from(token.clone()));
    }
    device.validate()?;

    Ok(Resolved {
        device,
        profile_name,
    })
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        return "(none)".into();
    }
    cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
}
