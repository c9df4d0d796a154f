use chrono::DateTime;
use regex::Regex;
use serde_json::Value;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Resolution of the persisted `Date` key.
pub const ROW_KEY_SECS: i64 = 60;

lazy_static::lazy_static! {
    // currency symbols, thousands separators and stray whitespace
    static ref NUMERIC_NOISE: Regex = Regex::new(r"[$,\s]").expect("valid numeric noise pattern");
}

/// Reads a JSON number, or a string holding one, as `f64`.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = NUMERIC_NOISE.replace_all(s, "");
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(places);
    let rounded = (value * factor).round() / factor;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}

/// Percent change from `previous` to `current`. A zero previous value yields 0.
pub fn pct_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    let change = (current - previous) / previous * 100.0;
    if change.is_finite() {
        change
    } else {
        0.0
    }
}

/// Key under which a candle is stored; candles sharing one collide in the CSV.
pub fn row_key(ts: i64) -> i64 {
    ts.div_euclid(ROW_KEY_SECS)
}

pub fn format_timestamp(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format(DATE_FORMAT).to_string(),
        None => ts.to_string(),
    }
}
