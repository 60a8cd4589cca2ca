use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

const HOUR_MS: i64 = 60 * 60 * 1_000;
const DAY_MS: i64 = 24 * HOUR_MS;

pub const DEFAULT_SPAN_MS: i64 = 7 * DAY_MS;

pub const SPANS: &[(&str, &str)] = &[
    ("1hr", "1 hour"),
    ("3hr", "3 hours"),
    ("12hr", "12 hours"),
    ("1day", "1 day"),
];

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("unrecognized time value {input:?}")]
    Malformed { input: String },
    #[error("time range is empty or reversed (start {start_ms} >= end {end_ms})")]
    Reversed { start_ms: i64, end_ms: i64 },
}

/// Half-open `[start_ms, end_ms)` range in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start_ms: i64,
    end_ms: i64,
}

impl TimeWindow {
    pub fn new(start_ms: i64, end_ms: i64) -> Result<Self, FormatError> {
        if start_ms >= end_ms {
            return Err(FormatError::Reversed { start_ms, end_ms });
        }
        Ok(Self { start_ms, end_ms })
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> i64 {
        self.end_ms
    }

    pub fn width_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    pub fn start_display(&self) -> String {
        format_timestamp(self.start_ms)
    }

    pub fn end_display(&self) -> String {
        format_timestamp(self.end_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub span: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[cfg(test)]
impl RangeQuery {
    pub fn is_empty(&self) -> bool {
        present(&self.span).is_none() && present(&self.start).is_none() && present(&self.end).is_none()
    }
}

pub fn span_duration_ms(span: Option<&str>) -> i64 {
    match span {
        Some("1hr") => HOUR_MS,
        Some("3hr") => 3 * HOUR_MS,
        Some("12hr") => 12 * HOUR_MS,
        Some("1day") => DAY_MS,
        _ => DEFAULT_SPAN_MS,
    }
}

/// Turns the request's range parameters into a concrete window.
///
/// The end is the explicit end if given, else the stream's latest known event,
/// else `now_ms`. An explicit start always wins over the relative span.
pub fn resolve(
    query: &RangeQuery,
    latest_known_event_ms: Option<i64>,
    now_ms: i64,
) -> Result<TimeWindow, FormatError> {
    let end_abs = present(&query.end).map(parse_timestamp).transpose()?;
    let start_abs = present(&query.start).map(parse_timestamp).transpose()?;

    let end_ms = end_abs.or(latest_known_event_ms).unwrap_or(now_ms);
    let start_ms = match start_abs {
        Some(start) => start,
        None => end_ms.saturating_sub(span_duration_ms(present(&query.span))),
    };

    TimeWindow::new(start_ms, end_ms)
}

/// Parses an absolute time: epoch milliseconds, RFC 3339, or a naive
/// `datetime-local` style value taken as UTC.
pub fn parse_timestamp(input: &str) -> Result<i64, FormatError> {
    let trimmed = input.trim();

    if let Ok(ms) = trimmed.parse::<i64>() {
        return Ok(ms);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.timestamp_millis());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp_millis())
        .ok_or_else(|| FormatError::Malformed {
            input: input.to_owned(),
        })
}

pub fn format_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn format_input_value(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|time| time.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default()
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}
