//! Device-side domain model and the controller seam used by the scheduler.
//!
//! The [`DeviceControl`] trait is the narrow contract between the scheduling
//! logic and the vendor API client: authenticate, set the two absence
//! bounds, and refresh/read state. Everything the scheduler knows about the
//! heater flows through it, which keeps the loop testable against scripted
//! fakes.
//!
//! The device reports its state as a list of named values; the known
//! identifiers are decoded once into typed [`StateValue`]s independent of
//! display formatting. The device clock may carry wildcard components, which
//! decode into a [`PartialDateTime`] and are filled from local time at
//! resolution.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::absence::AbsenceRange;
use crate::constants::ABSENCE_PARK_OFFSET_DAYS;
use crate::error::DeviceError;
use crate::logger::Log;

/// Device-reported clock with per-component wildcards.
///
/// The vendor encodes unknown components as `"*"`; they decode to `None`
/// here and are filled from the local clock when the value is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartialDateTime {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
}

impl PartialDateTime {
    /// Fill missing components from `local_now` and build a concrete instant.
    /// Returns `None` when the combined components do not form a valid
    /// date/time.
    pub fn resolve(&self, local_now: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = NaiveDate::from_ymd_opt(
            self.year.unwrap_or(local_now.year()),
            self.month.unwrap_or(local_now.month()),
            self.day.unwrap_or(local_now.day()),
        )?;
        let time = NaiveTime::from_hms_opt(
            self.hour.unwrap_or(local_now.time().hour()),
            self.minute.unwrap_or(local_now.time().minute()),
            self.second.unwrap_or(local_now.time().second()),
        )?;
        Some(date.and_time(time))
    }
}

/// Typed value for a known device state identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Temperature(f64),
    Date(PartialDateTime),
    Flag(bool),
    Count(u32),
}

/// The closed set of state identifiers decoded into typed values.
pub mod state_names {
    pub const ABSENCE_MODE: &str = "modbuslink:DHWAbsenceModeState";
    pub const MIDDLE_WATER_TEMPERATURE: &str = "modbuslink:MiddleWaterTemperatureState";
    pub const EXPECTED_SHOWER_COUNT: &str = "core:ExpectedNumberOfShowerState";
    pub const DATE_TIME: &str = "core:DateTimeState";
}

/// Decoded device state after a refresh.
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    pub label: String,
    /// Gateway health flag, when the read included gateway state.
    pub alive: Option<bool>,
    /// Absence mode currently active on the device.
    pub absence_mode: Option<bool>,
    /// Mid-tank water temperature in degrees Celsius.
    pub middle_temperature: Option<f64>,
    /// Configured number of expected showers.
    pub expected_showers: Option<u32>,
    /// Device-reported clock, possibly partial.
    pub clock: Option<PartialDateTime>,
    /// Remaining absence/temperature/heating states, kept raw for display.
    pub extra: Vec<(String, String)>,
}

impl DeviceSnapshot {
    /// Record a typed value for one of the known state identifiers.
    /// Unknown pairings are ignored; raw display states go into `extra`
    /// separately.
    pub fn record(&mut self, name: &str, value: StateValue) {
        match (name, value) {
            (state_names::ABSENCE_MODE, StateValue::Flag(flag)) => {
                self.absence_mode = Some(flag);
            }
            (state_names::MIDDLE_WATER_TEMPERATURE, StateValue::Temperature(celsius)) => {
                self.middle_temperature = Some(celsius);
            }
            (state_names::EXPECTED_SHOWER_COUNT, StateValue::Count(count)) => {
                self.expected_showers = Some(count);
            }
            (state_names::DATE_TIME, StateValue::Date(clock)) => {
                self.clock = Some(clock);
            }
            _ => {}
        }
    }

    /// Difference between the device clock and the local clock.
    ///
    /// Wildcard clock components are filled from `local_now` before the
    /// subtraction, so a device that only reports a time of day still yields
    /// a usable skew.
    pub fn clock_skew(&self, local_now: NaiveDateTime) -> Result<Duration, DeviceError> {
        let clock = self
            .clock
            .ok_or_else(|| DeviceError::Malformed("device reported no date/time state".into()))?;
        let device_now = clock.resolve(local_now).ok_or_else(|| {
            DeviceError::Malformed(format!("device clock does not resolve: {:?}", clock))
        })?;
        Ok(device_now.signed_duration_since(local_now))
    }

    /// Print the snapshot through the logger.
    pub fn log(&self) {
        Log::log_decorated(&format!("Device: {}", self.label));
        if let Some(alive) = self.alive {
            Log::log_indented(&format!("Gateway alive: {}", alive));
        }
        if let Some(absence) = self.absence_mode {
            Log::log_indented(&format!(
                "Absence mode: {}",
                if absence { "on" } else { "off" }
            ));
        }
        if let Some(temperature) = self.middle_temperature {
            Log::log_indented(&format!("Water temperature: {:.1}", temperature));
        }
        if let Some(count) = self.expected_showers {
            Log::log_indented(&format!("Expected showers: {}", count));
        }
        if let Some(clock) = &self.clock {
            Log::log_indented(&format!("Device clock: {:?}", clock));
        }
        for (name, value) in &self.extra {
            Log::log_indented(&format!("{}: {}", name, value));
        }
    }
}

/// Contract between the scheduler and the vendor API.
///
/// Every operation may fail transiently; callers retry, they never unwind.
pub trait DeviceControl {
    /// Run the full vendor authentication handshake. Called at the start of
    /// every programming attempt; sessions are never reused across attempts.
    fn authenticate(&mut self) -> Result<(), DeviceError>;

    /// Set the absence window start on the device, in device-local time.
    fn set_absence_start(&mut self, when: NaiveDateTime) -> Result<(), DeviceError>;

    /// Set the absence window end on the device, in device-local time.
    fn set_absence_end(&mut self, when: NaiveDateTime) -> Result<(), DeviceError>;

    /// Trigger a state refresh on the device and read it back.
    fn refresh_status(&mut self) -> Result<DeviceSnapshot, DeviceError>;

    /// Device clock minus local clock, derived from a fresh status read.
    fn clock_skew(&mut self, local_now: NaiveDateTime) -> Result<Duration, DeviceError> {
        self.refresh_status()?.clock_skew(local_now)
    }
}

/// One programming round: authenticate, correct for clock skew, write the
/// absence bounds (start always before end), then refresh for observability.
fn program<D: DeviceControl + ?Sized>(
    device: &mut D,
    local_now: NaiveDateTime,
    bounds: impl FnOnce(NaiveDateTime) -> (NaiveDateTime, NaiveDateTime),
) -> Result<DeviceSnapshot, DeviceError> {
    device.authenticate()?;
    let skew = device.clock_skew(local_now)?;
    let corrected_now = local_now + skew;
    let (start, end) = bounds(corrected_now);
    device.set_absence_start(start)?;
    device.set_absence_end(end)?;
    device.refresh_status()
}

/// Program the literal absence window onto the device, skew-corrected.
pub fn program_absence_window<D: DeviceControl + ?Sized>(
    device: &mut D,
    local_now: NaiveDateTime,
    range: &AbsenceRange,
) -> Result<DeviceSnapshot, DeviceError> {
    let range = *range;
    program(device, local_now, move |corrected_now| {
        let skew = corrected_now - local_now;
        (range.start + skew, range.end + skew)
    })
}

/// Force the heater off: span the absence window around now, pushed out by a
/// multi-year offset on both sides so the device never re-triggers by itself.
pub fn program_permanent_absence<D: DeviceControl + ?Sized>(
    device: &mut D,
    local_now: NaiveDateTime,
) -> Result<DeviceSnapshot, DeviceError> {
    let park = Duration::days(ABSENCE_PARK_OFFSET_DAYS);
    program(device, local_now, |corrected_now| {
        (corrected_now - park, corrected_now + park)
    })
}

/// Resume normal heating: park the whole absence window in the past.
pub fn program_resume<D: DeviceControl + ?Sized>(
    device: &mut D,
    local_now: NaiveDateTime,
) -> Result<DeviceSnapshot, DeviceError> {
    let park = Duration::days(ABSENCE_PARK_OFFSET_DAYS);
    program(device, local_now, |corrected_now| {
        (corrected_now - park - park, corrected_now - park)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn partial_datetime_fills_missing_fields_from_local_now() {
        let partial = PartialDateTime {
            hour: Some(14),
            minute: Some(30),
            ..Default::default()
        };
        let resolved = partial.resolve(local(10, 0, 45)).unwrap();
        assert_eq!(resolved, local(14, 30, 45));
    }

    #[test]
    fn complete_partial_datetime_ignores_local_now() {
        let partial = PartialDateTime {
            year: Some(2023),
            month: Some(12),
            day: Some(31),
            hour: Some(23),
            minute: Some(59),
            second: Some(58),
        };
        let resolved = partial.resolve(local(10, 0, 0)).unwrap();
        assert_eq!(
            resolved,
            NaiveDate::from_ymd_opt(2023, 12, 31)
                .unwrap()
                .and_hms_opt(23, 59, 58)
                .unwrap()
        );
    }

    #[test]
    fn invalid_components_do_not_resolve() {
        let partial = PartialDateTime {
            month: Some(13),
            ..Default::default()
        };
        assert!(partial.resolve(local(10, 0, 0)).is_none());
    }

    #[test]
    fn skew_is_device_minus_local() {
        let snapshot = DeviceSnapshot {
            clock: Some(PartialDateTime {
                year: Some(2024),
                month: Some(3),
                day: Some(10),
                hour: Some(10),
                minute: Some(5),
                second: Some(0),
            }),
            ..Default::default()
        };
        let skew = snapshot.clock_skew(local(10, 0, 0)).unwrap();
        assert_eq!(skew, Duration::minutes(5));
    }

    #[test]
    fn missing_clock_is_malformed() {
        let snapshot = DeviceSnapshot::default();
        assert!(matches!(
            snapshot.clock_skew(local(10, 0, 0)),
            Err(DeviceError::Malformed(_))
        ));
    }

    // Records the command sequence so ordering and skew application can be
    // asserted.
    #[derive(Default)]
    struct RecordingDevice {
        calls: Vec<String>,
        starts: Vec<NaiveDateTime>,
        ends: Vec<NaiveDateTime>,
        skew_minutes: i64,
    }

    impl DeviceControl for RecordingDevice {
        fn authenticate(&mut self) -> Result<(), DeviceError> {
            self.calls.push("auth".into());
            Ok(())
        }

        fn set_absence_start(&mut self, when: NaiveDateTime) -> Result<(), DeviceError> {
            self.calls.push("start".into());
            self.starts.push(when);
            Ok(())
        }

        fn set_absence_end(&mut self, when: NaiveDateTime) -> Result<(), DeviceError> {
            self.calls.push("end".into());
            self.ends.push(when);
            Ok(())
        }

        fn refresh_status(&mut self) -> Result<DeviceSnapshot, DeviceError> {
            self.calls.push("refresh".into());
            let minute = (self.skew_minutes % 60) as u32;
            Ok(DeviceSnapshot {
                clock: Some(PartialDateTime {
                    year: Some(2024),
                    month: Some(3),
                    day: Some(10),
                    hour: Some(12),
                    minute: Some(minute),
                    second: Some(0),
                }),
                ..Default::default()
            })
        }
    }

    #[test]
    fn window_programming_applies_skew_and_orders_commands() {
        let mut device = RecordingDevice {
            skew_minutes: 3,
            ..Default::default()
        };
        let now = local(12, 0, 0);
        let range = AbsenceRange {
            start: local(22, 0, 0),
            end: local(23, 0, 0),
        };

        program_absence_window(&mut device, now, &range).unwrap();

        assert_eq!(device.calls, ["auth", "refresh", "start", "end", "refresh"]);
        assert_eq!(device.starts, [local(22, 3, 0)]);
        assert_eq!(device.ends, [local(23, 3, 0)]);
    }

    #[test]
    fn permanent_absence_spans_now() {
        let mut device = RecordingDevice::default();
        let now = local(12, 0, 0);
        program_permanent_absence(&mut device, now).unwrap();

        assert!(device.starts[0] < now);
        assert!(device.ends[0] > now);
    }

    #[test]
    fn resume_parks_both_bounds_in_the_past() {
        let mut device = RecordingDevice::default();
        let now = local(12, 0, 0);
        program_resume(&mut device, now).unwrap();

        assert!(device.starts[0] < device.ends[0]);
        assert!(device.ends[0] < now);
    }
}
