//! Application constants and default values for offpeak.
//!
//! This module contains the configuration defaults, validation limits,
//! vendor endpoints, and operational constants used throughout the
//! application.

// ═══ Application Configuration Defaults ═══
// These values are used when config options are not specified by the user

pub const DEFAULT_CONFIG_FILE: &str = "offpeak.toml";
pub const DEFAULT_START_MARGIN_MINUTES: i64 = 0;
pub const DEFAULT_END_MARGIN_MINUTES: i64 = 0;
pub const DEFAULT_PROG_MARGIN_MINUTES: i64 = 10;

// ═══ Vendor API Endpoints ═══
// Atlantic account service plus the Cozytouch/Overkiz gateway it fronts

pub const ATLANTIC_BASE_URL: &str = "https://api.groupe-atlantic.com/";
pub const COZYTOUCH_API_URL: &str =
    "https://ha110-1.overkiz.com/enduser-mobile-web/externalAPI/json/";
pub const COZYTOUCH_LOGIN_URL: &str = "https://ha110-1.overkiz.com/enduser-mobile-web/enduserAPI/";

// Client credential expected by the Atlantic token endpoint (public app key)
pub const ATLANTIC_BASIC_AUTH: &str =
    "Basic czduc0RZZXdWbjVGbVV4UmlYN1pVSUM3ZFI4YTphSDEzOXZmbzA1ZGdqeDJkSFVSQkFTbmhCRW9h";

// ═══ Operational Timing Constants ═══
// Internal timing values for application operation

pub const RETRY_INTERVAL_SECS: u64 = 300; // 5 minutes between failed programming attempts
pub const CHECK_INTERVAL_SECS: u64 = 1; // How often to check the running flag during sleep
pub const HTTP_TIMEOUT_SECS: u64 = 8; // Bounded request timeout so a hung socket cannot wedge the loop
pub const INTER_REQUEST_DELAY_MS: u64 = 1000; // Pause between vendor API requests

// Offset used when parking the absence window fully in the past ("on") or
// spanning it around now ("off"). Large enough that the device's own
// scheduler never re-triggers on its own.
pub const ABSENCE_PARK_OFFSET_DAYS: i64 = 730;

// ═══ Validation Limits ═══
// These limits ensure user inputs are within reasonable and safe ranges

pub const MINIMUM_MARGIN_MINUTES: i64 = -240;
pub const MAXIMUM_MARGIN_MINUTES: i64 = 240;

// ═══ Notification Gate Defaults ═══
// Tunables for the chat notifier; overridable in the [notify] config section

pub const NOTIFY_MIN_INTERVAL_SECS: i64 = 10; // seconds between messages to the same chat
pub const NOTIFY_DAILY_CAP: u32 = 10; // max messages per 24h window
pub const NOTIFY_DEDUPE_WINDOW_SECS: i64 = 3600; // identical base text suppressed within this window
pub const NOTIFY_MAX_ATTEMPTS: u32 = 4; // delivery attempts before surfacing failure
pub const NOTIFY_BACKOFF_INITIAL_SECS: u64 = 1; // first retry delay
pub const NOTIFY_BACKOFF_CAP_SECS: u64 = 30; // retry delay ceiling

// ═══ Exit Codes ═══
// Standard exit codes for process termination

pub const EXIT_FAILURE: i32 = 1; // General failure
