//! The absence scheduling loop.
//!
//! A strictly single-threaded, blocking state machine: probe until the
//! vendor API answers, then forever alternate between programming the
//! device for the containing absence window and programming it back to
//! normal operation, sleeping until the next actionable boundary in
//! between.
//!
//! Every programming attempt re-authenticates from scratch: transient
//! failures may have invalidated the vendor session, and a fresh handshake
//! per attempt is cheap at this cadence. Failed attempts are retried at a
//! fixed interval indefinitely; a domestic control loop has no human on
//! call, so the loop never escalates a device failure into process exit.
//!
//! Sleeps run in one-second chunks so a shutdown signal is honored
//! promptly, and all time flows through the [`Clock`] trait so tests drive
//! the loop with a virtual clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use chrono::NaiveDateTime;

use crate::absence::{self, AbsenceRule, Margins};
use crate::clock::Clock;
use crate::constants::{CHECK_INTERVAL_SECS, RETRY_INTERVAL_SECS};
use crate::device::{self, DeviceControl};
use crate::error::DeviceError;
use crate::logger::Log;

/// Fixed-interval retry with unbounded attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub interval: StdDuration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: StdDuration::from_secs(RETRY_INTERVAL_SECS),
        }
    }
}

/// The scheduling loop, generic over the device seam and the time source.
pub struct Scheduler<'a, D: DeviceControl, K: Clock> {
    device: D,
    clock: K,
    rules: Vec<AbsenceRule>,
    margins: Margins,
    retry: RetryPolicy,
    running: &'a AtomicBool,
}

impl<'a, D: DeviceControl, K: Clock> Scheduler<'a, D, K> {
    pub fn new(
        device: D,
        clock: K,
        rules: Vec<AbsenceRule>,
        margins: Margins,
        retry: RetryPolicy,
        running: &'a AtomicBool,
    ) -> Self {
        Self {
            device,
            clock,
            rules,
            margins,
            retry,
            running,
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, in chunks, honoring the shutdown flag.
    fn sleep_while_running(&self, duration: StdDuration) {
        let chunk = StdDuration::from_secs(CHECK_INTERVAL_SECS);
        let mut remaining = duration;
        while !remaining.is_zero() && self.is_running() {
            let step = chunk.min(remaining);
            self.clock.sleep(step);
            remaining -= step;
        }
    }

    /// Block until `target`, re-reading the clock each chunk so large time
    /// jumps (system suspend) cannot strand the loop.
    fn sleep_until(&self, target: NaiveDateTime) {
        let chunk = StdDuration::from_secs(CHECK_INTERVAL_SECS);
        while self.is_running() {
            let now = self.clock.now();
            if now >= target {
                return;
            }
            let remaining = (target - now).to_std().unwrap_or(StdDuration::ZERO);
            self.clock.sleep(chunk.min(remaining));
        }
    }

    /// Attempt `operation` until it succeeds, sleeping the retry interval
    /// between failures. Returns `None` only when shutdown was requested.
    fn retry_until_ok<T>(
        &mut self,
        what: &str,
        mut operation: impl FnMut(&mut D, NaiveDateTime) -> Result<T, DeviceError>,
    ) -> Option<T> {
        loop {
            if !self.is_running() {
                return None;
            }
            let now = self.clock.now();
            match operation(&mut self.device, now) {
                Ok(value) => return Some(value),
                Err(error) => {
                    Log::log_error(&format!("{} failed: {}", what, error));
                    Log::log_decorated(&format!(
                        "Retrying in {} minutes",
                        self.retry.interval.as_secs() / 60
                    ));
                    self.sleep_while_running(self.retry.interval);
                }
            }
        }
    }

    /// Run the scheduling loop until shutdown is requested.
    pub fn run(&mut self) {
        // Guard against starting while the network or vendor API is down:
        // nothing proceeds until one full probe succeeds.
        Log::log_block_start("Probing device before entering the loop");
        let Some(snapshot) = self.retry_until_ok("Initial status probe", |device, _now| {
            device.authenticate()?;
            device.refresh_status()
        }) else {
            return;
        };
        snapshot.log();

        loop {
            if !self.is_running() {
                return;
            }
            let now = self.clock.now();

            if let Some(current) = absence::current_absence_range(&self.rules, &self.margins, now)
            {
                Log::log_block_start(&format!(
                    "Inside absence window {} -> {}",
                    current.start, current.end
                ));
                let Some(snapshot) = self.retry_until_ok("Absence programming", |device, now| {
                    device::program_absence_window(device, now, &current)
                }) else {
                    return;
                };
                snapshot.log();
                Log::log_decorated(&format!("Heater absent; sleeping until {}", current.end));
                self.sleep_until(current.end);
            } else {
                let Some(next) = absence::next_absence_range(&self.rules, &self.margins, now)
                else {
                    // Validated configuration always carries at least one rule
                    Log::log_warning("No absence windows configured; nothing to schedule");
                    self.sleep_while_running(self.retry.interval);
                    continue;
                };
                Log::log_block_start(&format!(
                    "Outside absence windows; next is {} -> {}",
                    next.start, next.end
                ));
                let Some(snapshot) = self.retry_until_ok("Resume programming", |device, now| {
                    device::program_resume(device, now)
                }) else {
                    return;
                };
                snapshot.log();
                Log::log_decorated(&format!("Heater active; sleeping until {}", next.start));
                self.sleep_until(next.start);
            }
        }
    }
}
