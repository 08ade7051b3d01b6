//! Configuration system for offpeak with validation and template generation.
//!
//! Configuration is TOML, searched at `$XDG_CONFIG_HOME/offpeak/offpeak.toml`
//! unless an explicit `--config` path is given. When no file exists at the
//! default location a commented template is written and the process exits so
//! the user can fill in credentials.
//!
//! ## Configuration Structure
//!
//! ```toml
//! [access]
//! login = "user@example.com"        # Vendor cloud account
//! password = "secret"
//!
//! [device]
//! url = "io://1234-5678-9012/123456" # Device URL from `offpeak scan`
//!
//! [[window]]                         # One table per daily peak period
//! start = "22:00"
//! end = "06:00"
//!
//! [margins]
//! start = 0                          # Minutes: widen the off window earlier
//! end = 0                            # Minutes: resume later after the window
//! prog = 10                          # Minutes: pre-stage commands ahead
//!
//! [log]
//! file = "/var/log/offpeak.log"      # Optional append-only event log
//!
//! [notify]                           # Optional chat notifications
//! bot_token = "1234:abcd"
//! chat_id = 123456789
//! ```
//!
//! ## Validation and Error Handling
//!
//! All values are validated during loading: times must parse, at least one
//! window must exist, margins must stay within ±240 minutes, and a window
//! whose margin-adjusted boundaries coincide is rejected. Invalid
//! configuration is fatal before any control loop starts.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::absence::{AbsenceRule, Margins};
use crate::constants::*;
use crate::logger::Log;

/// Vendor cloud account credentials.
#[derive(Debug, Deserialize, Clone)]
pub struct AccessConfig {
    pub login: String,
    pub password: String,
}

/// The single controlled device.
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    /// Vendor device URL, as printed by `offpeak scan`.
    pub url: String,
}

/// One daily peak window, times as `HH:MM` (seconds optional).
#[derive(Debug, Deserialize, Clone)]
pub struct WindowConfig {
    pub start: String,
    pub end: String,
}

/// Margin durations in minutes. Negative values narrow the window.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MarginsConfig {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub prog: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub file: Option<PathBuf>,
}

/// Chat notification settings. The whole section is optional; without it the
/// `notify` subcommand reports that notifications are not configured.
#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    pub bot_token: String,
    pub chat_id: i64,
    pub state_path: Option<PathBuf>,
    pub min_interval: Option<i64>,
    pub daily_cap: Option<u32>,
    pub dedupe_window: Option<i64>,
}

/// Top-level configuration for the offpeak application.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub access: AccessConfig,
    pub device: DeviceConfig,
    #[serde(rename = "window")]
    pub windows: Vec<WindowConfig>,
    pub margins: Option<MarginsConfig>,
    pub log: Option<LogConfig>,
    pub notify: Option<NotifyConfig>,
}

/// Commented starter configuration written on first run.
const CONFIG_TEMPLATE: &str = r#"# offpeak configuration
# Fill in your vendor cloud credentials, then run `offpeak scan` to find
# your device URL.

[access]
login = "user@example.com"
password = "change-me"

[device]
url = "io://0000-0000-0000/0000000"

# One [[window]] table per daily peak-tariff period. The heater is held in
# absence mode between start and end (local time) every day.
[[window]]
start = "22:00"
end = "06:00"

[margins]
start = 0   # minutes: switch off this much earlier than the window start
end = 0     # minutes: resume this much later than the window end
prog = 10   # minutes: program the device this far ahead of the window

[log]
file = "offpeak.log"

# Optional Telegram notifications:
# [notify]
# bot_token = "1234:abcd"
# chat_id = 123456789
"#;

impl Config {
    /// Default configuration path: `$XDG_CONFIG_HOME/offpeak/offpeak.toml`.
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("offpeak").join(DEFAULT_CONFIG_FILE))
    }

    /// Load and validate configuration.
    ///
    /// With an explicit path a missing file is a plain error. At the default
    /// location a missing file is replaced by a template and the load fails
    /// with a prompt to edit it.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = match explicit_path {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_path()?,
        };

        if !path.exists() {
            if explicit_path.is_none() {
                Self::write_template(&path)?;
                anyhow::bail!(
                    "No configuration found. A template was written to {}.\n\
                     Edit your credentials and device URL, then run offpeak again.",
                    path.display()
                );
            }
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        fs::write(path, CONFIG_TEMPLATE)
            .with_context(|| format!("Failed to write config template {}", path.display()))
    }

    /// Margin durations, defaulted where the section or a field is absent.
    pub fn margins(&self) -> Margins {
        let margins = self.margins.clone().unwrap_or_default();
        Margins::from_minutes(
            margins.start.unwrap_or(DEFAULT_START_MARGIN_MINUTES),
            margins.end.unwrap_or(DEFAULT_END_MARGIN_MINUTES),
            margins.prog.unwrap_or(DEFAULT_PROG_MARGIN_MINUTES),
        )
    }

    /// Parse the configured windows into absence rules.
    pub fn rules(&self) -> Result<Vec<AbsenceRule>> {
        self.windows
            .iter()
            .map(|window| {
                Ok(AbsenceRule {
                    daily_start: parse_time(&window.start)?,
                    daily_end: parse_time(&window.end)?,
                })
            })
            .collect()
    }

    /// Log file destination, if configured.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.log.as_ref().and_then(|log| log.file.clone())
    }

    fn validate(&self) -> Result<()> {
        if self.access.login.trim().is_empty() {
            anyhow::bail!("Config error: [access] login must not be empty");
        }
        if self.access.password.trim().is_empty() {
            anyhow::bail!("Config error: [access] password must not be empty");
        }
        if self.device.url.trim().is_empty() {
            anyhow::bail!("Config error: [device] url must not be empty");
        }
        if self.windows.is_empty() {
            anyhow::bail!("Config error: at least one [[window]] must be configured");
        }

        if let Some(margins) = &self.margins {
            for (name, value) in [
                ("start", margins.start),
                ("end", margins.end),
                ("prog", margins.prog),
            ] {
                if let Some(minutes) = value {
                    if !(MINIMUM_MARGIN_MINUTES..=MAXIMUM_MARGIN_MINUTES).contains(&minutes) {
                        anyhow::bail!(
                            "Config error: margin '{}' must be between {} and {} minutes (got {})",
                            name,
                            MINIMUM_MARGIN_MINUTES,
                            MAXIMUM_MARGIN_MINUTES,
                            minutes
                        );
                    }
                }
            }
        }

        let margins = self.margins();
        for (index, rule) in self.rules()?.iter().enumerate() {
            let adjusted_start = rule.daily_start - margins.start - margins.prog;
            let adjusted_end = rule.daily_end + margins.end;
            if adjusted_start == adjusted_end {
                anyhow::bail!(
                    "Config error: window {} collapses to a point once margins are applied",
                    index + 1
                );
            }
        }

        if let Some(notify) = &self.notify {
            if notify.bot_token.trim().is_empty() {
                anyhow::bail!("Config error: [notify] bot_token must not be empty");
            }
            if notify.chat_id == 0 {
                anyhow::bail!("Config error: [notify] chat_id must not be zero");
            }
        }

        Ok(())
    }

    /// Print the effective configuration at startup.
    pub fn log_config(&self) {
        Log::log_block_start("Loaded configuration");
        Log::log_indented(&format!("Account: {}", self.access.login));
        Log::log_indented(&format!("Device: {}", self.device.url));
        for window in &self.windows {
            Log::log_indented(&format!("Peak window: {} -> {}", window.start, window.end));
        }
        let margins = self.margins();
        Log::log_indented(&format!(
            "Margins: start {}m, end {}m, prog {}m",
            margins.start.num_minutes(),
            margins.end.num_minutes(),
            margins.prog.num_minutes()
        ));
        if let Some(file) = self.log_file() {
            Log::log_indented(&format!("Log file: {}", file.display()));
        }
        if self.notify.is_some() {
            Log::log_indented("Notifications: enabled");
        }
    }
}

/// Parse a configured time of day, accepting `HH:MM` and `HH:MM:SS`.
fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .with_context(|| format!("Invalid time of day '{}' (expected HH:MM)", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_config(toml_text: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_text)?;
        config.validate()?;
        Ok(config)
    }

    const VALID: &str = r#"
        [access]
        login = "me@example.com"
        password = "hunter2"

        [device]
        url = "io://1234-5678-9012/123456"

        [[window]]
        start = "22:00"
        end = "06:00"
    "#;

    #[test]
    fn parses_minimal_config() {
        let config = parse_config(VALID).unwrap();
        assert_eq!(config.windows.len(), 1);
        let rules = config.rules().unwrap();
        assert_eq!(
            rules[0].daily_start,
            NaiveTime::from_hms_opt(22, 0, 0).unwrap()
        );
        // Absent margins fall back to defaults
        assert_eq!(
            config.margins().prog.num_minutes(),
            DEFAULT_PROG_MARGIN_MINUTES
        );
    }

    #[test]
    fn accepts_times_with_seconds() {
        let text = VALID.replace("\"22:00\"", "\"22:00:30\"");
        let config = parse_config(&text).unwrap();
        let rules = config.rules().unwrap();
        assert_eq!(
            rules[0].daily_start,
            NaiveTime::from_hms_opt(22, 0, 30).unwrap()
        );
    }

    #[test]
    fn rejects_empty_credentials() {
        let text = VALID.replace("\"hunter2\"", "\"\"");
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn rejects_missing_windows() {
        let text = r#"
            [access]
            login = "me@example.com"
            password = "hunter2"

            [device]
            url = "io://1234-5678-9012/123456"

            window = []
        "#;
        assert!(parse_config(text).is_err());
    }

    #[test]
    fn rejects_unparseable_time() {
        let text = VALID.replace("\"22:00\"", "\"25:99\"");
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn rejects_out_of_range_margin() {
        let text = format!("{VALID}\n[margins]\nstart = 500\n");
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn accepts_negative_margin() {
        let text = format!("{VALID}\n[margins]\nstart = -30\nprog = 0\n");
        let config = parse_config(&text).unwrap();
        assert_eq!(config.margins().start.num_minutes(), -30);
    }

    #[test]
    fn rejects_window_collapsed_by_margins() {
        let text = r#"
            [access]
            login = "me@example.com"
            password = "hunter2"

            [device]
            url = "io://1234-5678-9012/123456"

            [[window]]
            start = "10:00"
            end = "10:00"

            [margins]
            start = 0
            end = 0
            prog = 0
        "#;
        assert!(parse_config(text).is_err());
    }

    #[test]
    fn notify_section_requires_token_and_chat() {
        let text = format!("{VALID}\n[notify]\nbot_token = \"\"\nchat_id = 5\n");
        assert!(parse_config(&text).is_err());

        let text = format!("{VALID}\n[notify]\nbot_token = \"1234:abcd\"\nchat_id = 0\n");
        assert!(parse_config(&text).is_err());

        let text = format!("{VALID}\n[notify]\nbot_token = \"1234:abcd\"\nchat_id = 42\n");
        assert!(parse_config(&text).is_ok());
    }
}
