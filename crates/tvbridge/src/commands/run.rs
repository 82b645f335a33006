//! `tvbridge run`: a long-lived bridge driven from stdin.
//!
//! Each input line becomes a host write (`command`, `power.on`, ...) and
//! every state the bridge publishes is echoed as `key = value`.

use futures_util::StreamExt;
use futures_util::future::LocalBoxFuture;
use futures_util::stream::FuturesUnordered;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use tvbridge_core::host::{COMMAND, PAIRING_PIN, POWER_CHECK, POWER_OFF, POWER_ON};
use tvbridge_core::{Bridge, CoreError, Published, StateValue};

use crate::cli::GlobalOpts;
use crate::error::CliError;

use super::util;

/// One parsed input line.
#[derive(Debug, PartialEq)]
enum Input {
    Empty,
    Quit,
    Status,
    Help,
    Write { key: String, value: StateValue },
}

fn write(key: &str, value: impl Into<StateValue>) -> Input {
    Input::Write {
        key: key.to_owned(),
        value: value.into(),
    }
}

fn parse_line(line: &str) -> Input {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));

    match (word.to_ascii_lowercase().as_str(), rest) {
        ("", _) => Input::Empty,
        ("quit" | "exit", _) => Input::Quit,
        ("status", _) => Input::Status,
        ("help" | "?", _) => Input::Help,
        ("check", _) => write(POWER_CHECK, true),
        ("power", "on") => write(POWER_ON, true),
        ("power", "off") => write(POWER_OFF, true),
        ("pin", pin) => write(PAIRING_PIN, pin),
        _ if word.starts_with("keys.") => write(word, true),
        _ => write(COMMAND, line),
    }
}

const HELP: &str = "\
  <key>          send a key (VolumeUp, KEY_MUTE, ...)
  keys.<G>.<N>   press a key button
  power on|off   switch the TV and wait for it
  check          re-confirm the power state
  pin <digits>   answer a pairing prompt
  status         show connection and power state
  quit           stop";

fn print_status(bridge: &Bridge) {
    println!(
        "connection = {}, power = {}",
        bridge.controller().state(),
        bridge.reconciler().state()
    );
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let session = util::start(global)?;
    let published = session.host.states().subscribe();

    if !global.quiet {
        eprintln!(
            "Bridging {} ({}). Type 'help' for commands.",
            session.address(),
            session.bridge.config().variant
        );
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let result = drive(&session.bridge, published, stdin, global.quiet).await;
    session.bridge.shutdown().await;
    result
}

/// Feed input lines to the bridge until `quit`, end of input or ctrl-c.
///
/// Writes run concurrently with reading: a power write lasts until the TV
/// converges, and a later write may supersede it.
async fn drive<R>(
    bridge: &Bridge,
    mut published: broadcast::Receiver<Published>,
    input: R,
    quiet: bool,
) -> Result<(), CliError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut pending: FuturesUnordered<LocalBoxFuture<'_, (String, Result<(), CoreError>)>> =
        FuturesUnordered::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some((key, result)) = pending.next(), if !pending.is_empty() => {
                if let Err(e) = result {
                    eprintln!("   ✗ {key}: {e}");
                }
            }
            update = published.recv() => match update {
                Ok(p) if !quiet => println!("{} = {}", p.key, p.value),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "state echo lagged"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_line(&line) {
                    Input::Empty => {}
                    Input::Quit => break,
                    Input::Help => eprintln!("{HELP}"),
                    Input::Status => print_status(bridge),
                    Input::Write { key, value } => pending.push(Box::pin(async move {
                        let result = bridge.handle_user_command(&key, value).await;
                        (key, result)
                    })),
                }
            }
        }
    }

    if !pending.is_empty() {
        debug!(in_flight = pending.len(), "dropping unfinished writes");
    }
    Ok(())
}
