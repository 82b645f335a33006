//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};
use serde::Serialize;

use tvbridge_core::ProtocolVariant;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "address = \"{}\"", p.address);
        let _ = writeln!(out, "protocol = \"{}\"", p.protocol);
        if let Some(ref mac) = p.mac {
            let _ = writeln!(out, "mac = \"{mac}\"");
        }
        if let Some(ref app_name) = p.app_name {
            let _ = writeln!(out, "app_name = \"{app_name}\"");
        }
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if p.pin.is_some() {
            let _ = writeln!(out, "pin = \"****\"");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(model_2016) = p.model_2016 {
            let _ = writeln!(out, "model_2016 = {model_2016}");
        }
    }

    out
}

/// Redacted copy for structured output.
#[derive(Serialize)]
struct RedactedProfile<'a> {
    name: &'a str,
    address: &'a str,
    protocol: &'a str,
    mac: Option<&'a str>,
    has_token: bool,
    has_pin: bool,
    model_2016: Option<bool>,
}

fn redacted_profiles(cfg: &Config) -> Vec<RedactedProfile<'_>> {
    cfg.profiles
        .iter()
        .map(|(name, p)| RedactedProfile {
            name,
            address: &p.address,
            protocol: &p.protocol,
            mac: p.mac.as_deref(),
            has_token: p.token.is_some(),
            has_pin: p.pin.is_some(),
            model_2016: p.model_2016,
        })
        .collect()
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn init_wizard() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("tvbridge configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    // 1. Profile name
    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    // 2. Address
    let address: String = Input::new()
        .with_prompt("TV address")
        .interact_text()
        .map_err(prompt_err)?;
    if address.trim().is_empty() {
        return Err(CliError::Validation {
            field: "address".into(),
            reason: "address cannot be empty".into(),
        });
    }

    // 3. Protocol
    let choices = &[
        "token   (2018 and newer, secure channel on 8002)",
        "legacy  (2016 models, channel on 8001)",
        "pin     (H/J series, PIN pairing)",
        "generic (2013 and older, TCP remote on 55000)",
    ];
    let protocol = match Select::new()
        .with_prompt("Remote protocol")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?
    {
        0 => ProtocolVariant::Token,
        1 => ProtocolVariant::Legacy,
        2 => ProtocolVariant::Pin,
        _ => ProtocolVariant::Generic,
    };

    // 4. MAC for Wake-on-LAN
    let mac: String = Input::new()
        .with_prompt("MAC address for Wake-on-LAN (blank to skip)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;
    let mac = mac.trim();
    if !mac.is_empty() && mac.parse::<tvbridge_core::MacAddr>().is_err() {
        return Err(CliError::Validation {
            field: "mac".into(),
            reason: format!("'{mac}' is not a hardware address"),
        });
    }

    // 5. Merge into existing config
    let mut cfg = config::load_config_or_default();
    if cfg.profiles.contains_key(&profile_name)
        && !Confirm::new()
            .with_prompt(format!("Replace existing profile '{profile_name}'?"))
            .default(false)
            .interact()
            .map_err(prompt_err)?
    {
        eprintln!("Nothing changed.");
        return Ok(());
    }

    cfg.profiles.insert(
        profile_name.clone(),
        Profile {
            address: address.trim().to_owned(),
            protocol: protocol.to_string(),
            mac: (!mac.is_empty()).then(|| mac.to_owned()),
            ..Profile::default()
        },
    );
    if cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }

    // 6. Write config
    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Profile: {profile_name}");
    eprintln!("\n  Test it: tvbridge status -p {profile_name}");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init_wizard(),

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = output::render_single(
                &global.output,
                &redacted_profiles(&cfg),
                |_| format_config_redacted(&cfg),
                |profiles| {
                    profiles
                        .iter()
                        .map(|p| format!("{}\t{}", p.name, p.address))
                        .collect::<Vec<_>>()
                        .join("\n")
                },
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: tvbridge config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }
    }
}
