//! `tvbridge power on|off`
//!
//! Runs the engine's convergence loop: one power key press (or a
//! Wake-on-LAN packet for a TV that is fully off), then polling until the
//! network agrees or the poll budget runs out.

use std::time::Duration;

use serde::Serialize;

use tvbridge_core::{Reachability, TcpProbe};

use crate::cli::{GlobalOpts, PowerArgs, PowerTarget};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct PowerReport {
    address: String,
    requested: &'static str,
    reached: &'static str,
}

fn word(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

pub async fn handle(args: PowerArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let desired = matches!(args.state, PowerTarget::On);
    let session = util::start(global)?;
    let address = session.address().to_owned();
    let result = converge(&session, desired, global).await;
    session.bridge.shutdown().await;
    let reached = result?;

    let report = PowerReport {
        address,
        requested: word(desired),
        reached: word(reached),
    };
    if reached != desired {
        return Err(CliError::Power {
            message: format!("the TV is still {} after polling", report.reached),
        });
    }

    let out = output::render_single(
        &global.output,
        &report,
        |r| format!("✓ {} is {}", r.address, r.reached),
        |r| r.reached.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn converge(
    session: &util::Session,
    desired: bool,
    global: &GlobalOpts,
) -> Result<bool, CliError> {
    let config = session.bridge.config();

    // Switching off needs a session to press the key through; switching
    // on either finds the TV already up or falls back to Wake-on-LAN.
    if !desired {
        let probe = TcpProbe::new(config.probe_ports.clone());
        if probe.probe(&config.address, config.probe_timeout).await {
            util::wait_connected(session, Duration::from_secs(global.wait)).await?;
        }
    }

    Ok(session.bridge.reconciler().wait_for_power(desired).await?)
}
