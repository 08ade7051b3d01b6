//! The `scan` subcommand: enumerate the account's gateway and devices.
//!
//! This is how users discover the device URL to put in the configuration.

use anyhow::Result;

use crate::config::Config;
use crate::cozytouch::CozytouchClient;
use crate::logger::Log;

pub fn run(config: &Config) -> Result<()> {
    let mut client = CozytouchClient::new(config)?;
    let report = client.scan()?;

    if report.gateway_alive {
        Log::log_decorated("Gateway: OK");
    } else {
        Log::log_warning("Gateway not alive");
    }

    Log::log_decorated("Devices:");
    for device in &report.devices {
        Log::log_indented(&format!("{}: {}", device.label, device.widget));
        Log::log_indented(&format!("    deviceURL: {}", device.device_url));
    }
    Ok(())
}
