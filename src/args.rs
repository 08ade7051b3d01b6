//! Command-line argument parsing and processing.
//!
//! This module handles parsing of command-line arguments and provides a
//! clean interface for the main application logic. It supports the
//! subcommands for scanning, probing, forcing, and running the scheduler,
//! plus the standard help and version flags, while gracefully handling
//! unknown options.

use std::path::PathBuf;

use crate::logger::Log;

/// Represents the parsed command-line action.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Enumerate the account's gateway and devices
    Scan,
    /// Probe the device and print its state
    Status,
    /// Enter the scheduling loop (default)
    Run,
    /// One-shot: force the heater back to normal operation
    ForceOn,
    /// One-shot: force the heater into absence mode
    ForceOff,
    /// Send one message through the notification gate
    Notify { text: String },
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
    pub config_path: Option<PathBuf>,
    pub debug_enabled: bool,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// # Arguments
    /// * `args` - Iterator over command-line arguments (typically from std::env::args())
    ///
    /// # Returns
    /// ParsedArgs containing the determined action
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut config_path: Option<PathBuf> = None;
        let mut command: Option<String> = None;
        let mut notify_words: Vec<String> = Vec::new();
        let mut unknown_arg_found = false;

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            let arg_str = &args_vec[i];
            match arg_str.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--config" | "-c" => {
                    if i + 1 < args_vec.len() {
                        config_path = Some(PathBuf::from(&args_vec[i + 1]));
                        i += 1;
                    } else {
                        Log::log_warning("Missing path for --config. Usage: --config <path>");
                        unknown_arg_found = true;
                    }
                }
                _ => {
                    if arg_str.starts_with('-') {
                        Log::log_warning(&format!("Unknown option: {}", arg_str));
                        unknown_arg_found = true;
                    } else if command.is_none() {
                        command = Some(arg_str.clone());
                    } else if command.as_deref() == Some("notify") {
                        // Everything after `notify` is the message text
                        notify_words.push(arg_str.clone());
                    } else {
                        Log::log_warning(&format!("Unexpected argument: {}", arg_str));
                        unknown_arg_found = true;
                    }
                }
            }
            i += 1;
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if display_help || unknown_arg_found {
            if unknown_arg_found {
                CliAction::ShowHelpDueToError
            } else {
                CliAction::ShowHelp
            }
        } else {
            match command.as_deref() {
                None | Some("run") => CliAction::Run,
                Some("scan") => CliAction::Scan,
                Some("status") => CliAction::Status,
                Some("on") => CliAction::ForceOn,
                Some("off") => CliAction::ForceOff,
                Some("notify") => {
                    if notify_words.is_empty() {
                        Log::log_warning("Missing message text. Usage: notify <text>");
                        CliAction::ShowHelpDueToError
                    } else {
                        CliAction::Notify {
                            text: notify_words.join(" "),
                        }
                    }
                }
                Some(other) => {
                    Log::log_warning(&format!("Unknown command: {}", other));
                    CliAction::ShowHelpDueToError
                }
            }
        };

        ParsedArgs {
            action,
            config_path,
            debug_enabled,
        }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    println!("offpeak {}", env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    println!("offpeak {}", env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("Usage: offpeak [OPTIONS] [COMMAND]");
    println!();
    println!("Commands:");
    println!("  run            Enter the scheduling loop (default)");
    println!("  scan           Enumerate the account's gateway and devices");
    println!("  status         Probe the device and print its state");
    println!("  on             Force the heater back to normal operation");
    println!("  off            Force the heater into absence mode");
    println!("  notify <text>  Send one message through the notification gate");
    println!();
    println!("Options:");
    println!("  -c, --config <path>  Use this configuration file");
    println!("  -d, --debug          Enable detailed debug output");
    println!("  -h, --help           Print help information");
    println!("  -V, --version        Print version information");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_args_defaults_to_run() {
        let parsed = ParsedArgs::parse(vec!["offpeak"]);
        assert_eq!(parsed.action, CliAction::Run);
        assert_eq!(parsed.config_path, None);
        assert!(!parsed.debug_enabled);
    }

    #[test]
    fn test_parse_explicit_run() {
        let parsed = ParsedArgs::parse(vec!["offpeak", "run"]);
        assert_eq!(parsed.action, CliAction::Run);
    }

    #[test]
    fn test_parse_subcommands() {
        assert_eq!(
            ParsedArgs::parse(vec!["offpeak", "scan"]).action,
            CliAction::Scan
        );
        assert_eq!(
            ParsedArgs::parse(vec!["offpeak", "status"]).action,
            CliAction::Status
        );
        assert_eq!(
            ParsedArgs::parse(vec!["offpeak", "on"]).action,
            CliAction::ForceOn
        );
        assert_eq!(
            ParsedArgs::parse(vec!["offpeak", "off"]).action,
            CliAction::ForceOff
        );
    }

    #[test]
    fn test_parse_config_option() {
        let parsed = ParsedArgs::parse(vec!["offpeak", "status", "--config", "/tmp/x.toml"]);
        assert_eq!(parsed.action, CliAction::Status);
        assert_eq!(parsed.config_path, Some(PathBuf::from("/tmp/x.toml")));
    }

    #[test]
    fn test_parse_config_short_option_before_command() {
        let parsed = ParsedArgs::parse(vec!["offpeak", "-c", "conf.toml", "run"]);
        assert_eq!(parsed.action, CliAction::Run);
        assert_eq!(parsed.config_path, Some(PathBuf::from("conf.toml")));
    }

    #[test]
    fn test_parse_config_missing_value() {
        let parsed = ParsedArgs::parse(vec!["offpeak", "--config"]);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_notify_joins_words() {
        let parsed = ParsedArgs::parse(vec!["offpeak", "notify", "heater", "is", "off"]);
        assert_eq!(
            parsed.action,
            CliAction::Notify {
                text: "heater is off".to_string()
            }
        );
    }

    #[test]
    fn test_parse_notify_without_text() {
        let parsed = ParsedArgs::parse(vec!["offpeak", "notify"]);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_help_flag() {
        let parsed = ParsedArgs::parse(vec!["offpeak", "--help"]);
        assert_eq!(parsed.action, CliAction::ShowHelp);
    }

    #[test]
    fn test_parse_version_flags() {
        assert_eq!(
            ParsedArgs::parse(vec!["offpeak", "--version"]).action,
            CliAction::ShowVersion
        );
        assert_eq!(
            ParsedArgs::parse(vec!["offpeak", "-V"]).action,
            CliAction::ShowVersion
        );
    }

    #[test]
    fn test_parse_debug_flag() {
        let parsed = ParsedArgs::parse(vec!["offpeak", "run", "--debug"]);
        assert_eq!(parsed.action, CliAction::Run);
        assert!(parsed.debug_enabled);
    }

    #[test]
    fn test_parse_unknown_flag() {
        let parsed = ParsedArgs::parse(vec!["offpeak", "--unknown"]);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_unknown_command() {
        let parsed = ParsedArgs::parse(vec!["offpeak", "explode"]);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_trailing_argument_rejected() {
        let parsed = ParsedArgs::parse(vec!["offpeak", "status", "extra"]);
        assert_eq!(parsed.action, CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_version_takes_precedence() {
        let parsed = ParsedArgs::parse(vec!["offpeak", "--version", "--help", "scan"]);
        assert_eq!(parsed.action, CliAction::ShowVersion);
    }
}
