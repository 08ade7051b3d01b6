//! The `on` and `off` subcommands: one-shot absence programming.
//!
//! `off` parks an absence window spanning now so the heater stays inactive;
//! `on` parks the whole window in the past so the heater resumes.

use anyhow::Result;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::cozytouch::CozytouchClient;
use crate::device;
use crate::logger::Log;

pub fn run(config: &Config, absence: bool) -> Result<()> {
    let mut client = CozytouchClient::new(config)?;
    let now = SystemClock.now();

    let snapshot = if absence {
        Log::log_decorated("Forcing heater into absence mode");
        device::program_permanent_absence(&mut client, now)?
    } else {
        Log::log_decorated("Forcing heater back to normal operation");
        device::program_resume(&mut client, now)?
    };
    snapshot.log();
    Ok(())
}
