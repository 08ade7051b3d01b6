//! End-to-end scheduling scenarios through the public API.
//!
//! A configuration file is written to disk, loaded and validated, and the
//! resulting rules drive the window calculator the way the scheduler does.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use offpeak::absence::{current_absence_range, next_absence_range};
use offpeak::config::Config;
use std::io::Write;

fn load_config(dir: &tempfile::TempDir, body: &str) -> Config {
    let path = dir.path().join("offpeak.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    Config::load(Some(path.as_path())).unwrap()
}

const OVERNIGHT_CONFIG: &str = r#"
[access]
login = "me@example.com"
password = "hunter2"

[device]
url = "io://1234-5678-9012/123456"

[[window]]
start = "22:00"
end = "06:00"

[margins]
start = 0
end = 0
prog = 0
"#;

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

#[test]
fn overnight_window_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(&dir, OVERNIGHT_CONFIG);
    let rules = config.rules().unwrap();
    let margins = config.margins();

    // At 21:00 the window has not begun: next is tonight 22:00 through
    // tomorrow 06:00, and there is no current window
    let now = at(10, 21, 0);
    assert!(current_absence_range(&rules, &margins, now).is_none());

    let next = next_absence_range(&rules, &margins, now).unwrap();
    assert_eq!(next.start, at(10, 22, 0));
    assert_eq!(next.end, at(11, 6, 0));
}

#[test]
fn overnight_window_once_inside() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(&dir, OVERNIGHT_CONFIG);
    let rules = config.rules().unwrap();
    let margins = config.margins();

    // At 23:00 we are inside: the containing window started today at 22:00
    // and runs to tomorrow 06:00
    let now = at(10, 23, 0);
    let current = current_absence_range(&rules, &margins, now).unwrap();
    assert_eq!(current.start, at(10, 22, 0));
    assert_eq!(current.end, at(11, 6, 0));

    // The following occurrence begins after this one ends
    let next = next_absence_range(&rules, &margins, now).unwrap();
    assert_eq!(next.start, at(11, 22, 0));
    assert!(next.start >= current.end);
}

#[test]
fn margins_shift_the_loaded_windows() {
    let dir = tempfile::tempdir().unwrap();
    let body = OVERNIGHT_CONFIG
        .replace("start = 0", "start = 15")
        .replace("end = 0", "end = 30")
        .replace("prog = 0", "prog = 5");
    let config = load_config(&dir, &body);
    let rules = config.rules().unwrap();
    let margins = config.margins();

    let now = at(10, 12, 0);
    let next = next_absence_range(&rules, &margins, now).unwrap();
    // 22:00 minus 15 minutes start margin minus 5 minutes pre-stage
    assert_eq!(next.start, at(10, 21, 40));
    // 06:00 plus 30 minutes end margin
    assert_eq!(next.end, at(11, 6, 30));
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.toml");
    assert!(Config::load(Some(path.as_path())).is_err());
}
