use anyhow::{Context, Result};
use fs2::FileExt;
use signal_hook::{
    consts::signal::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    fs::File,
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

mod absence;
mod args;
mod clock;
mod commands;
mod config;
mod constants;
mod cozytouch;
mod device;
mod error;
mod logger;
mod notify;
mod scheduler;

use args::{CliAction, ParsedArgs, display_help, display_version_info};
use clock::SystemClock;
use config::Config;
use constants::*;
use cozytouch::CozytouchClient;
use logger::Log;
use notify::{Notifier, SendResult};
use scheduler::{RetryPolicy, Scheduler};

fn main() {
    let parsed = ParsedArgs::from_env();

    match &parsed.action {
        CliAction::ShowHelp => {
            display_help();
            return;
        }
        CliAction::ShowHelpDueToError => {
            display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::ShowVersion => {
            display_version_info();
            return;
        }
        _ => {}
    }

    let command = command_name(&parsed.action);

    // Configuration problems are the only fatal startup errors: report and
    // exit before any loop is entered.
    let config = match Config::load(parsed.config_path.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            Log::log_error(&format!("{:#}", error));
            std::process::exit(EXIT_FAILURE);
        }
    };

    Log::set_file(config.log_file());
    Log::log_banner(command);
    if parsed.debug_enabled {
        Log::log_debug("Debug output enabled");
        config.log_config();
    }

    let result = match parsed.action {
        CliAction::Scan => commands::scan::run(&config),
        CliAction::Status => commands::status::run(&config),
        CliAction::ForceOn => commands::force::run(&config, false),
        CliAction::ForceOff => commands::force::run(&config, true),
        CliAction::Notify { ref text } => run_notify(&config, text),
        CliAction::Run => run_scheduler(&config),
        CliAction::ShowHelp | CliAction::ShowHelpDueToError | CliAction::ShowVersion => Ok(()),
    };

    match result {
        Ok(()) => Log::log_end(command),
        Err(error) => {
            Log::log_error(&format!("{} failed: {:#}", command, error));
            Log::log_end(command);
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn command_name(action: &CliAction) -> &'static str {
    match action {
        CliAction::Scan => "scan",
        CliAction::Status => "status",
        CliAction::Run => "run",
        CliAction::ForceOn => "on",
        CliAction::ForceOff => "off",
        CliAction::Notify { .. } => "notify",
        _ => "",
    }
}

/// Send one message through the notification gate. A skipped message is a
/// normal outcome, not a failure.
fn run_notify(config: &Config, text: &str) -> Result<()> {
    let notify_config = config
        .notify
        .as_ref()
        .context("No [notify] section in the configuration")?;
    let gate = Notifier::from_config(notify_config)?;

    match gate.send(text)? {
        SendResult::Sent { final_text } => {
            Log::log_decorated(&format!("Sent: {}", final_text.replace('\n', " ")));
        }
        SendResult::Skipped { reason } => {
            Log::log_warning(&format!("Skipped: {}", reason));
        }
    }
    Ok(())
}

/// Enter the scheduling loop. Never returns normally; shutdown signals are
/// the only way out short of a crash.
fn run_scheduler(config: &Config) -> Result<()> {
    // One scheduler per machine: two loops would fight over the device
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    let lock_path = format!("{}/offpeak.lock", runtime_dir);
    let lock_file = File::create(&lock_path)
        .with_context(|| format!("Failed to create lock file {}", lock_path))?;

    if lock_file.try_lock_exclusive().is_err() {
        anyhow::bail!(
            "Another instance of offpeak is already running.\n\
            Stop it before starting a new one."
        );
    }
    Log::log_decorated("Lock acquired, starting scheduler...");
    config.log_config();

    // Set up signal handling: SIGINT/SIGTERM request a clean shutdown,
    // observed by the loop between sleep chunks.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    let mut signals = Signals::new([SIGTERM, SIGINT])?;
    thread::spawn(move || {
        for signal in signals.forever() {
            Log::log_pipe();
            Log::log_info(&format!("Shutdown signal received: {:?}", signal));
            r.store(false, Ordering::SeqCst);
        }
    });

    let device = CozytouchClient::new(config)?;
    let mut scheduler = Scheduler::new(
        device,
        SystemClock,
        config.rules()?,
        config.margins(),
        RetryPolicy::default(),
        &running,
    );
    scheduler.run();

    Log::log_block_start("Shutting down offpeak...");
    cleanup(lock_file, &lock_path);
    Ok(())
}

/// Release and remove the lock file on shutdown.
fn cleanup(lock_file: File, lock_path: &str) {
    drop(lock_file);
    if let Err(error) = std::fs::remove_file(lock_path) {
        Log::log_decorated(&format!("Warning: failed to remove lock file: {}", error));
    }
}
