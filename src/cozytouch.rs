//! Client for the Atlantic/Cozytouch cloud API.
//!
//! Authentication is a three-step handshake: an OAuth password grant against
//! the Atlantic account service, a JWT fetch with the resulting bearer
//! token, then a cookie-establishing login against the Cozytouch gateway.
//! All later calls ride the session cookie.
//!
//! Commands are wrapped in the generic `exec/apply` envelope: a device URL
//! plus a named command with parameters. State reads return a flat list of
//! `{name, value}` pairs per device; the known identifiers are decoded into
//! typed values, the rest are carried raw for display.
//!
//! Every call can fail transiently (network, HTTP status, malformed
//! payload); the caller retries. Requests carry a bounded timeout so a hung
//! socket cannot wedge the control loop, and consecutive requests are paced
//! out of politeness to the vendor.

use std::thread;
use std::time::Duration as StdDuration;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Config;
use crate::constants::*;
use crate::device::{DeviceControl, DeviceSnapshot, PartialDateTime, StateValue, state_names};
use crate::error::DeviceError;
use crate::logger::Log;

/// Blocking HTTP client for the vendor cloud, bound to one device.
pub struct CozytouchClient {
    http: reqwest::blocking::Client,
    login: String,
    password: String,
    device_url: String,
}

/// One device row from a `scan`.
#[derive(Debug, Clone)]
pub struct DeviceListing {
    pub label: String,
    pub widget: String,
    pub device_url: String,
}

/// Result of enumerating the account's setup.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub gateway_alive: bool,
    pub devices: Vec<DeviceListing>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct StateDto {
    name: String,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct DeviceDto {
    #[serde(rename = "deviceURL")]
    device_url: String,
    label: String,
    #[serde(default)]
    states: Vec<StateDto>,
}

impl CozytouchClient {
    /// Build a client from the loaded configuration. The HTTP client keeps a
    /// cookie store for the gateway session and applies the request timeout.
    pub fn new(config: &Config) -> Result<Self, DeviceError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(StdDuration::from_secs(HTTP_TIMEOUT_SECS))
            .cookie_store(true)
            .build()?;
        Ok(Self {
            http,
            login: config.access.login.clone(),
            password: config.access.password.clone(),
            device_url: config.device.url.clone(),
        })
    }

    /// Pause between consecutive vendor requests.
    fn pace(&self) {
        thread::sleep(StdDuration::from_millis(INTER_REQUEST_DELAY_MS));
    }

    fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, DeviceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(DeviceError::Api {
            status: status.as_u16(),
            body,
        })
    }

    fn decode_json(text: &str) -> Result<Value, DeviceError> {
        serde_json::from_str(text).map_err(|_| DeviceError::Malformed(text.to_string()))
    }

    /// GET an external-API path relative to the Cozytouch data endpoint.
    fn get(&self, path: &str) -> Result<Value, DeviceError> {
        let url = format!("{}{}", COZYTOUCH_API_URL, path);
        let response = self
            .http
            .get(&url)
            .header("cache-control", "no-cache")
            .send()?;
        let text = Self::check(response)?.text()?;
        self.pace();
        Self::decode_json(&text)
    }

    /// GET an enduser-API path (the endpoint the session cookie belongs to).
    fn get_enduser(&self, path: &str) -> Result<Value, DeviceError> {
        let url = format!("{}{}", COZYTOUCH_LOGIN_URL, path);
        let response = self
            .http
            .get(&url)
            .header("cache-control", "no-cache")
            .send()?;
        let text = Self::check(response)?.text()?;
        self.pace();
        Self::decode_json(&text)
    }

    /// Apply a named command with parameters to the configured device.
    fn command(&self, name: &str, parameters: Value) -> Result<(), DeviceError> {
        let url = format!("{}exec/apply", COZYTOUCH_LOGIN_URL);
        let body = json!({
            "actions": [
                {
                    "deviceURL": self.device_url,
                    "commands": [
                        {
                            "name": name,
                            "parameters": parameters,
                        }
                    ]
                }
            ]
        });

        Log::log_indented(&format!("Sending command: {}", name));
        let response = self
            .http
            .post(&url)
            .header("cache-control", "no-cache")
            .json(&body)
            .send()?;
        let text = Self::check(response)?.text()?;
        self.pace();
        Self::decode_json(&text)?;
        Ok(())
    }

    /// Read all devices of the setup and return ours.
    fn fetch_device(&self) -> Result<DeviceDto, DeviceError> {
        let value = self.get_enduser("setup/devices")?;
        let devices: Vec<DeviceDto> = serde_json::from_value(value.clone())
            .map_err(|_| DeviceError::Malformed(value.to_string()))?;
        devices
            .into_iter()
            .find(|device| device.device_url == self.device_url)
            .ok_or_else(|| {
                DeviceError::Malformed(format!(
                    "configured device {} not present in setup",
                    self.device_url
                ))
            })
    }

    /// Enumerate the account's gateway and devices (the `scan` subcommand).
    pub fn scan(&mut self) -> Result<ScanReport, DeviceError> {
        self.authenticate()?;
        self.get("refreshAllStates")?;
        let setup = self.get("getSetup")?;

        let gateway_alive = setup
            .pointer("/setup/gateways/0/alive")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let devices = setup
            .pointer("/setup/devices")
            .and_then(Value::as_array)
            .ok_or_else(|| DeviceError::Malformed(setup.to_string()))?
            .iter()
            .map(|device| DeviceListing {
                label: text_field(device, "label"),
                widget: text_field(device, "widget"),
                device_url: text_field(device, "deviceURL"),
            })
            .collect();

        Ok(ScanReport {
            gateway_alive,
            devices,
        })
    }

    /// Full probe for the `status` subcommand: refresh every interesting
    /// state family before reading the device back.
    pub fn probe_status(&mut self) -> Result<DeviceSnapshot, DeviceError> {
        self.authenticate()?;
        for refresh in [
            "refreshDateTime",
            "refreshAbsenceMode",
            "refreshHeatingStatus",
            "refreshMiddleWaterTemperatureIn",
            "refreshMiddleWaterTemperature",
        ] {
            self.command(refresh, json!([]))?;
        }
        self.get("refreshAllStates")?;
        Ok(snapshot_from_device(&self.fetch_device()?))
    }
}

impl DeviceControl for CozytouchClient {
    fn authenticate(&mut self) -> Result<(), DeviceError> {
        // Step 1: password grant against the Atlantic account service
        let url = format!("{}token", ATLANTIC_BASE_URL);
        let response = self
            .http
            .post(&url)
            .header("Authorization", ATLANTIC_BASIC_AUTH)
            .form(&[
                ("grant_type", "password"),
                ("username", self.login.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()?;
        let text = Self::check(response)?.text()?;
        let token: TokenResponse = serde_json::from_str(&text)
            .map_err(|_| DeviceError::Malformed(text.clone()))?;
        Log::log_indented("Atlantic token acquired");

        // Step 2: exchange the bearer token for a gateway JWT
        let url = format!("{}gacoma/gacomawcfservice/accounts/jwt", ATLANTIC_BASE_URL);
        let response = self.http.get(&url).bearer_auth(&token.access_token).send()?;
        let jwt = Self::check(response)?.text()?;
        let jwt = jwt.trim().trim_matches('"').to_string();
        if jwt.is_empty() {
            return Err(DeviceError::Malformed("empty JWT from account service".into()));
        }
        Log::log_indented("Gateway JWT acquired");

        // Step 3: cookie login against the Cozytouch gateway
        let url = format!("{}login", COZYTOUCH_LOGIN_URL);
        let response = self.http.post(&url).form(&[("jwt", jwt.as_str())]).send()?;
        Self::check(response)?;
        self.pace();
        Log::log_indented("Gateway session established");
        Ok(())
    }

    fn set_absence_start(&mut self, when: NaiveDateTime) -> Result<(), DeviceError> {
        self.command("setAbsenceStartDate", json!([date_parameters(when)]))
    }

    fn set_absence_end(&mut self, when: NaiveDateTime) -> Result<(), DeviceError> {
        self.command("setAbsenceEndDate", json!([date_parameters(when)]))
    }

    fn refresh_status(&mut self) -> Result<DeviceSnapshot, DeviceError> {
        self.command("refreshDateTime", json!([]))?;
        self.command("refreshAbsenceMode", json!([]))?;
        self.get("refreshAllStates")?;
        Ok(snapshot_from_device(&self.fetch_device()?))
    }
}

/// The `{year, month, day, weekday, hour, minute, second}` object the
/// absence date commands expect, in device-local time.
fn date_parameters(when: NaiveDateTime) -> Value {
    json!({
        "year": when.year(),
        "month": when.month(),
        "day": when.day(),
        "weekday": when.weekday().num_days_from_monday(),
        "hour": when.hour(),
        "minute": when.minute(),
        "second": when.second(),
    })
}

fn text_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Families of state names carried raw for display when not decoded.
const DISPLAY_FAMILIES: [&str; 3] = ["Absence", "Temperature", "Heating"];

fn snapshot_from_device(device: &DeviceDto) -> DeviceSnapshot {
    let mut snapshot = DeviceSnapshot {
        label: device.label.clone(),
        ..Default::default()
    };
    for state in &device.states {
        if let Some(value) = decode_state(&state.name, &state.value) {
            snapshot.record(&state.name, value);
        } else if DISPLAY_FAMILIES
            .iter()
            .any(|family| state.name.contains(family))
        {
            snapshot
                .extra
                .push((state.name.clone(), display_value(&state.value)));
        }
    }
    snapshot
}

/// Decode one of the known state identifiers into its typed value.
fn decode_state(name: &str, value: &Value) -> Option<StateValue> {
    match name {
        state_names::ABSENCE_MODE => value
            .as_str()
            .map(|text| StateValue::Flag(text.eq_ignore_ascii_case("on"))),
        state_names::MIDDLE_WATER_TEMPERATURE => number(value).map(StateValue::Temperature),
        state_names::EXPECTED_SHOWER_COUNT => {
            number(value).map(|count| StateValue::Count(count as u32))
        }
        state_names::DATE_TIME => decode_partial_datetime(value).map(StateValue::Date),
        _ => None,
    }
}

/// Numeric value that may arrive as a JSON number or a numeric string.
fn number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|text| text.parse().ok()))
}

/// One clock component: a number, a numeric string, or the `"*"` wildcard.
fn component(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
}

fn decode_partial_datetime(value: &Value) -> Option<PartialDateTime> {
    let object = value.as_object()?;
    Some(PartialDateTime {
        year: component(object.get("year")).map(|year| year as i32),
        month: component(object.get("month")).map(|month| month as u32),
        day: component(object.get("day")).map(|day| day as u32),
        hour: component(object.get("hour")).map(|hour| hour as u32),
        minute: component(object.get("minute")).map(|minute| minute as u32),
        second: component(object.get("second")).map(|second| second as u32),
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
