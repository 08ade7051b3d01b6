//! Throttled, deduplicating chat notifications.
//!
//! The gate sits between callers and the chat transport: a daily cap, a
//! minimum interval, and duplicate suppression on the base text are checked
//! under a mutex before anything goes out. Skipped messages are counted and
//! surfaced as a `(skipped N)` suffix on the next accepted send, so a quiet
//! chat still reveals that the gate has been busy.
//!
//! Gate state is persisted as a flat JSON record keyed by chat identity.
//! Persistence failures are swallowed: the gate favors availability of
//! sending over perfect bookkeeping. Delivery itself is retried with
//! exponential backoff, with a provider-directed rate-limit wait taking
//! priority over the local delay.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::clock::{Clock, SystemClock};
use crate::config::NotifyConfig;
use crate::constants::*;
use crate::error::NotifyError;

/// Why a message was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DailyCap,
    MinInterval,
    Duplicate,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::DailyCap => write!(f, "daily cap reached"),
            SkipReason::MinInterval => write!(f, "min interval"),
            SkipReason::Duplicate => write!(f, "duplicate message"),
        }
    }
}

/// Outcome of an admitted or rejected send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    Sent { final_text: String },
    Skipped { reason: SkipReason },
}

/// Transport-level outcome of one delivery attempt.
#[derive(Debug)]
pub enum Delivery {
    Accepted,
    /// The provider asked us to slow down, optionally saying for how long.
    RateLimited { retry_after: Option<StdDuration> },
}

/// A chat channel capable of carrying one text message.
pub trait Transport {
    fn deliver(&self, text: &str) -> anyhow::Result<Delivery>;
}

/// Gate tunables; defaults match the constants module.
#[derive(Debug, Clone, Copy)]
pub struct GateLimits {
    pub min_interval_secs: i64,
    pub daily_cap: u32,
    pub dedupe_window_secs: i64,
    pub append_timestamp: bool,
    pub max_attempts: u32,
}

impl Default for GateLimits {
    fn default() -> Self {
        Self {
            min_interval_secs: NOTIFY_MIN_INTERVAL_SECS,
            daily_cap: NOTIFY_DAILY_CAP,
            dedupe_window_secs: NOTIFY_DEDUPE_WINDOW_SECS,
            append_timestamp: true,
            max_attempts: NOTIFY_MAX_ATTEMPTS,
        }
    }
}

/// Persisted per-chat gate record. Field names match the historical state
/// file so existing deployments keep their counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ChatState {
    #[serde(default)]
    last_sent_ts: i64,
    #[serde(default)]
    daily_count: u32,
    #[serde(default)]
    daily_reset_ts: i64,
    #[serde(default)]
    last_base_message: String,
    #[serde(default)]
    skipped_since_last_send: u32,
}

type StateFile = HashMap<String, ChatState>;

/// The notification gate for one chat identity.
pub struct Notifier<T: Transport, K: Clock> {
    transport: T,
    clock: K,
    chat_id: i64,
    state_path: PathBuf,
    limits: GateLimits,
    state: Mutex<StateFile>,
}

impl Notifier<TelegramTransport, SystemClock> {
    /// Build a Telegram-backed notifier from the `[notify]` config section.
    pub fn from_config(config: &NotifyConfig) -> anyhow::Result<Self> {
        let transport = TelegramTransport::new(&config.bot_token, config.chat_id)?;
        let state_path = match &config.state_path {
            Some(path) => path.clone(),
            None => dirs::home_dir()
                .context("Could not determine home directory for notifier state")?
                .join(".offpeak_notify.json"),
        };
        let limits = GateLimits {
            min_interval_secs: config.min_interval.unwrap_or(NOTIFY_MIN_INTERVAL_SECS),
            daily_cap: config.daily_cap.unwrap_or(NOTIFY_DAILY_CAP),
            dedupe_window_secs: config.dedupe_window.unwrap_or(NOTIFY_DEDUPE_WINDOW_SECS),
            ..GateLimits::default()
        };
        Ok(Self::new(
            transport,
            SystemClock,
            config.chat_id,
            state_path,
            limits,
        ))
    }
}

impl<T: Transport, K: Clock> Notifier<T, K> {
    pub fn new(
        transport: T,
        clock: K,
        chat_id: i64,
        state_path: PathBuf,
        limits: GateLimits,
    ) -> Self {
        let state = Mutex::new(load_state(&state_path));
        Self {
            transport,
            clock,
            chat_id,
            state_path,
            limits,
            state,
        }
    }

    fn chat_key(&self) -> String {
        self.chat_id.to_string()
    }

    fn now_ts(&self) -> i64 {
        self.clock.now().and_utc().timestamp()
    }

    /// Best-effort persistence; never fails the caller.
    fn persist(&self, state: &StateFile) {
        if let Some(parent) = self.state_path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = fs::create_dir_all(parent);
            }
        }
        if let Ok(serialized) = serde_json::to_string(state) {
            let _ = fs::write(&self.state_path, serialized);
        }
    }

    /// Admission check against the current record. Returns the rejection
    /// reason, or `None` when the message may go out.
    fn admission(&self, entry: &ChatState, base_text: &str, now: i64) -> Option<SkipReason> {
        if entry.daily_count >= self.limits.daily_cap {
            return Some(SkipReason::DailyCap);
        }
        if now - entry.last_sent_ts < self.limits.min_interval_secs {
            return Some(SkipReason::MinInterval);
        }
        if base_text == entry.last_base_message
            && now - entry.last_sent_ts < self.limits.dedupe_window_secs
        {
            return Some(SkipReason::Duplicate);
        }
        None
    }

    /// Send `text` through the gate.
    ///
    /// Admission, composition, and the state update all happen under the
    /// gate mutex so concurrent callers cannot double-admit around the
    /// rate limit.
    pub fn send(&self, text: &str) -> Result<SendResult, NotifyError> {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = self.now_ts();
        let key = self.chat_key();

        let skipped_so_far;
        {
            let entry = guard.entry(key.clone()).or_default();

            // Lazy 24h rollover; good enough for a domestic notifier
            if entry.daily_reset_ts == 0 {
                entry.daily_reset_ts = now + 24 * 3600;
            } else if entry.daily_reset_ts < now {
                entry.daily_count = 0;
                entry.daily_reset_ts = now + 24 * 3600;
            }

            if let Some(reason) = self.admission(entry, text, now) {
                entry.skipped_since_last_send += 1;
                self.persist(&guard);
                return Ok(SendResult::Skipped { reason });
            }
            skipped_so_far = entry.skipped_since_last_send;
        }

        // Compose the final text: base + timestamp + skip counter
        let mut final_text = text.to_string();
        if self.limits.append_timestamp {
            final_text.push_str(&format!(
                "\n- {}",
                self.clock.now().format("%d/%m %H:%M:%S")
            ));
        }
        if skipped_so_far > 0 {
            final_text.push_str(&format!("  (skipped {})", skipped_so_far));
        }

        self.deliver_with_retries(&final_text)?;

        // Delivery succeeded: update and persist the record
        let sent_at = self.now_ts();
        if let Some(entry) = guard.get_mut(&key) {
            entry.last_sent_ts = sent_at;
            entry.daily_count += 1;
            entry.last_base_message = text.to_string();
            entry.skipped_since_last_send = 0;
        }
        self.persist(&guard);

        Ok(SendResult::Sent { final_text })
    }

    /// Bounded delivery retry: exponential backoff, capped, with the
    /// provider's own wait taking priority when it supplies one.
    fn deliver_with_retries(&self, final_text: &str) -> Result<(), NotifyError> {
        let mut delay = StdDuration::from_secs(NOTIFY_BACKOFF_INITIAL_SECS);
        let cap = StdDuration::from_secs(NOTIFY_BACKOFF_CAP_SECS);
        let mut last_error = None;

        for attempt in 1..=self.limits.max_attempts {
            match self.transport.deliver(final_text) {
                Ok(Delivery::Accepted) => return Ok(()),
                Ok(Delivery::RateLimited { retry_after }) => {
                    let wait = retry_after
                        .map(|directed| directed + StdDuration::from_secs(1))
                        .unwrap_or(delay);
                    self.clock.sleep(wait);
                    delay = (delay * 2).min(cap);
                    last_error = Some(anyhow!("provider rate limit"));
                }
                Err(error) => {
                    last_error = Some(error);
                    if attempt < self.limits.max_attempts {
                        self.clock.sleep(delay);
                        delay = (delay * 2).min(cap);
                    }
                }
            }
        }

        Err(NotifyError::Delivery {
            attempts: self.limits.max_attempts,
            source: last_error.unwrap_or_else(|| anyhow!("delivery failed")),
        })
    }
}

fn load_state(path: &std::path::Path) -> StateFile {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => StateFile::default(),
    }
}

/// Telegram Bot API transport.
pub struct TelegramTransport {
    http: reqwest::blocking::Client,
    url: String,
    chat_id: i64,
}

impl TelegramTransport {
    pub fn new(bot_token: &str, chat_id: i64) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(StdDuration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to build notification HTTP client")?;
        Ok(Self {
            http,
            url: format!("https://api.telegram.org/bot{}/sendMessage", bot_token),
            chat_id,
        })
    }
}

impl Transport for TelegramTransport {
    fn deliver(&self, text: &str) -> anyhow::Result<Delivery> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "chat_id": self.chat_id, "text": text }))
            .send()
            .context("sendMessage request failed")?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .json::<Value>()
                .ok()
                .and_then(|body| {
                    body.pointer("/parameters/retry_after")
                        .and_then(Value::as_u64)
                })
                .map(StdDuration::from_secs);
            return Ok(Delivery::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("sendMessage failed with status {}: {}", status, body);
        }
        Ok(Delivery::Accepted)
    }
}
