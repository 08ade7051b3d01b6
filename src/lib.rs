//! # offpeak
//!
//! Keeps a cloud-connected domestic water heater off during peak tariff
//! hours by programming the device's "absence" (away) window, and carries a
//! throttled, deduplicating chat notifier on the side.
//!
//! ## Architecture
//!
//! - **absence**: Pure calculation of current/next absence windows
//! - **args**: Command-line argument parsing
//! - **clock**: Time source abstraction (real and virtual clocks)
//! - **commands**: One-shot CLI command handlers
//! - **config**: Configuration loading, validation, and template generation
//! - **constants**: Application-wide constants and defaults
//! - **cozytouch**: Client for the Atlantic/Cozytouch cloud API
//! - **device**: Device domain model and the controller seam
//! - **error**: Device and notification error taxonomy
//! - **logger**: Structured stdout logging plus the event log file
//! - **notify**: Rate-limited, deduplicating notification gate
//! - **scheduler**: The blocking absence scheduling loop

pub mod absence;
pub mod args;
pub mod clock;
pub mod commands;
pub mod config;
pub mod constants;
pub mod cozytouch;
pub mod device;
pub mod error;
pub mod logger;
pub mod notify;
pub mod scheduler;

// Re-export important types for easier access
pub use absence::{AbsenceRange, AbsenceRule, Margins};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use device::{DeviceControl, DeviceSnapshot};
pub use logger::{Log, LogLevel};
pub use notify::{GateLimits, Notifier, SendResult, SkipReason, Transport};
pub use scheduler::{RetryPolicy, Scheduler};
