//! `tvbridge status`

use serde::Serialize;

use tvbridge_core::{Reachability, TcpProbe};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct StatusReport {
    profile: Option<String>,
    address: String,
    protocol: String,
    mac: Option<String>,
    probe_ports: Vec<u16>,
    reachable: bool,
}

fn detail(report: &StatusReport, color: bool) -> String {
    let mut lines = vec![
        format!("Address:    {}", report.address),
        format!("Protocol:   {}", report.protocol),
    ];
    if let Some(ref profile) = report.profile {
        lines.insert(0, format!("Profile:    {profile}"));
    }
    if let Some(ref mac) = report.mac {
        lines.push(format!("MAC:        {mac}"));
    }
    let ports: Vec<String> = report.probe_ports.iter().map(u16::to_string).collect();
    lines.push(format!("Probed:     {}", ports.join(", ")));
    lines.push(format!("Reachable:  {}", output::flag(report.reachable, color)));
    lines.join("\n")
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve_device(global)?;
    let device = resolved.device;

    let probe = TcpProbe::new(device.probe_ports.clone());
    let reachable = probe.probe(&device.address, device.probe_timeout).await;

    let report = StatusReport {
        profile: resolved.profile_name,
        address: device.address.clone(),
        protocol: device.variant.to_string(),
        mac: device.mac.map(|m| m.to_string()),
        probe_ports: device.probe_ports.clone(),
        reachable,
    };
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &report,
        |r| detail(r, color),
        |r| if r.reachable { "on".into() } else { "off".into() },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
