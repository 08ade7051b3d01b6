//! The `status` subcommand: refresh and print the device state.

use anyhow::Result;

use crate::config::Config;
use crate::cozytouch::CozytouchClient;

pub fn run(config: &Config) -> Result<()> {
    let mut client = CozytouchClient::new(config)?;
    let snapshot = client.probe_status()?;
    snapshot.log();
    Ok(())
}
