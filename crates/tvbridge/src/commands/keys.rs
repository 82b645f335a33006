//! `tvbridge keys`

use serde::Serialize;
use tabled::Tabled;

use tvbridge_core::keys::{Command, KEYS};

use crate::cli::{GlobalOpts, KeysArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct KeyEntry {
    group: &'static str,
    name: &'static str,
    code: &'static str,
    state_key: String,
}

impl From<&Command> for KeyEntry {
    fn from(c: &Command) -> Self {
        Self {
            group: c.group,
            name: c.name,
            code: c.code,
            state_key: c.state_key(),
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct KeyRow {
    #[tabled(rename = "Group")]
    group: &'static str,
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "Code")]
    code: &'static str,
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &KeysArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let entries: Vec<KeyEntry> = KEYS
        .iter()
        .filter(|k| {
            args.group
                .as_deref()
                .is_none_or(|g| k.group.eq_ignore_ascii_case(g))
        })
        .map(KeyEntry::from)
        .collect();

    if entries.is_empty() {
        return Err(CliError::Validation {
            field: "group".into(),
            reason: format!(
                "no keys in group '{}'",
                args.group.as_deref().unwrap_or_default()
            ),
        });
    }

    let out = output::render_list(
        &global.output,
        &entries,
        |e| KeyRow {
            group: e.group,
            name: e.name,
            code: e.code,
        },
        |e| e.code.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
