//! Structured logging with visual stdout formatting and a line-oriented file sink.
//!
//! Stdout output uses Unicode box drawing characters for readable, structured
//! terminal output. In parallel, every significant event is appended to the
//! configured log file as a plain `timestamp - message` line so the history
//! survives across unattended runs.
//!
//! The logger supports runtime enable/disable for quiet operation during
//! automated processes or testing.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;

// Use an AtomicBool instead of thread_local for thread safety
static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

// Path of the append-only log file, set once at startup from the config
static LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Log level enumeration for categorizing message importance.
#[derive(Debug)]
pub enum LogLevel {
    Log,  // Normal operational logs
    Warn, // Warning messages (non-fatal issues)
    Err,  // Error messages (recoverable failures)
    Info, // Informational messages (status updates)
}

/// Main logging interface providing structured output formatting.
pub struct Log;

impl Log {
    /// Enable or disable logging temporarily.
    ///
    /// This is useful for quiet operation during automated processes
    /// or testing where log output would interfere with results.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Check if logging is currently enabled.
    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Route file output to `path`. Called once after the config is loaded;
    /// until then messages only reach stdout.
    pub fn set_file(path: Option<PathBuf>) {
        if let Ok(mut sink) = LOG_FILE.lock() {
            *sink = path;
        }
    }

    /// Append a `timestamp - message` line to the log file, if one is set.
    ///
    /// Sink failures are swallowed: losing a log line must never take down
    /// the control loop.
    fn append_to_file(message: &str) {
        let Ok(sink) = LOG_FILE.lock() else {
            return;
        };
        let Some(path) = sink.as_ref() else {
            return;
        };
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(file, "{} - {}", stamp, message);
        }
    }

    /// Main log function with level-based prefixes.
    ///
    /// Outputs messages with appropriate severity prefixes to stdout and
    /// appends the message to the log file.
    ///
    /// # Arguments
    /// * `level` - LogLevel indicating message importance
    /// * `message` - Text content to log
    pub fn log(level: LogLevel, message: &str) {
        // Skip logging if disabled
        if !Self::is_enabled() {
            return;
        }

        match level {
            LogLevel::Log => print!("[LOG] "),
            LogLevel::Warn => print!("[WARN] "),
            LogLevel::Err => print!("[ERR] "),
            LogLevel::Info => print!("[INFO] "),
        }
        println!("{}", message);

        Self::append_to_file(message);
    }

    // ═══ Convenience Methods for Common Log Levels ═══

    /// Log an error message.
    pub fn log_error(message: &str) {
        Self::log(LogLevel::Err, message);
    }

    /// Log a warning message.
    pub fn log_warning(message: &str) {
        Self::log(LogLevel::Warn, message);
    }

    /// Log an informational message.
    pub fn log_info(message: &str) {
        Self::log(LogLevel::Info, message);
    }

    /// Log a debug/operational message.
    pub fn log_debug(message: &str) {
        Self::log(LogLevel::Log, message);
    }

    // ═══ Visual Formatting Functions ═══

    /// Log a decorated message with visual branching indicator.
    ///
    /// Used for main status messages and important information.
    pub fn log_decorated(message: &str) {
        if !Self::is_enabled() {
            return;
        }
        println!("┣ {}", message);
        Self::append_to_file(message);
    }

    /// Log an indented message for sub-items or details.
    ///
    /// Used for secondary information under main status messages.
    /// Indented details stay on stdout only; the file keeps top-level events.
    pub fn log_indented(message: &str) {
        if !Self::is_enabled() {
            return;
        }
        println!("┃   {}", message);
    }

    /// Log a visual pipe separator.
    pub fn log_pipe() {
        if !Self::is_enabled() {
            return;
        }
        println!("┃");
    }

    /// Log a block start message with visual separation.
    ///
    /// Used for major state changes or new operational phases.
    pub fn log_block_start(message: &str) {
        if !Self::is_enabled() {
            return;
        }
        println!("┃");
        println!("┣ {}", message);
        Self::append_to_file(message);
    }

    /// Log the session banner naming the invoked command.
    ///
    /// Creates the initial visual header when the application starts.
    pub fn log_banner(command: &str) {
        if !Self::is_enabled() {
            return;
        }
        println!("┏ offpeak v{} ━━╸ {}", env!("CARGO_PKG_VERSION"), command);
        println!("┃");
        Self::append_to_file(&format!(
            "offpeak v{} started: {}",
            env!("CARGO_PKG_VERSION"),
            command
        ));
    }

    /// Log the final termination marker.
    ///
    /// Closes the visual structure when the application ends.
    pub fn log_end(command: &str) {
        if !Self::is_enabled() {
            return;
        }
        println!("╹");
        Self::append_to_file(&format!("offpeak finished: {}", command));
    }
}
