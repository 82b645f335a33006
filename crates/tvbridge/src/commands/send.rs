//! `tvbridge send <key>`

use std::time::Duration;

use serde::Serialize;

use tvbridge_core::keys;

use crate::cli::{GlobalOpts, SendArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct Sent {
    address: String,
    key: &'static str,
    code: &'static str,
}

pub async fn handle(args: SendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Fail on typos before touching the network.
    if keys::lookup(&args.key).is_none() {
        return Err(CliError::UnknownKey { name: args.key });
    }

    let session = util::start(global)?;
    let result = send(&session, &args.key, global).await;
    session.bridge.shutdown().await;
    let sent = result?;

    let out = output::render_single(
        &global.output,
        &sent,
        |s| format!("✓ {} ({}) sent to {}", s.key, s.code, s.address),
        |s| s.code.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn send(session: &util::Session, key: &str, global: &GlobalOpts) -> Result<Sent, CliError> {
    util::wait_connected(session, Duration::from_secs(global.wait)).await?;
    let command = session.bridge.dispatcher().dispatch(key).await?;
    Ok(Sent {
        address: session.address().to_owned(),
        key: command.name,
        code: command.code,
    })
}
