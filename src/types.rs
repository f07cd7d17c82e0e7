use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone};
use serde::{Deserialize, Serialize};

/// One timestamped reading as it lives in a Series Log.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub time: DateTime<Local>,
    /// Raw reading in millivolts.
    pub value: f64,
    /// Derived pH, present only when a complete calibration was applied.
    pub ph: Option<f64>,
}

impl Sample {
    pub fn new(time: DateTime<Local>, value: f64, ph: Option<f64>) -> Self {
        Self { time, value, ph }
    }
}

/// Which field of a log is charted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeriesChoice {
    #[default]
    Raw,
    Derived,
}

impl SeriesChoice {
    pub const ALL: [SeriesChoice; 2] = [SeriesChoice::Raw, SeriesChoice::Derived];

    pub fn label(self) -> &'static str {
        match self {
            SeriesChoice::Raw => "Voltage (mV)",
            SeriesChoice::Derived => "pH",
        }
    }

    pub fn axis_title(self) -> &'static str {
        match self {
            SeriesChoice::Raw => "Value (mV)",
            SeriesChoice::Derived => "pH",
        }
    }

    pub fn metric_label(self) -> &'static str {
        match self {
            SeriesChoice::Raw => "Current Value (mV)",
            SeriesChoice::Derived => "Current pH",
        }
    }

    /// Column name in the CSV layout.
    pub fn field(self) -> &'static str {
        match self {
            SeriesChoice::Raw => "value",
            SeriesChoice::Derived => "pH",
        }
    }
}

/// Binding of a Series Log to a display label.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSource {
    pub path: String,
    pub title: String,
}

impl ChartSource {
    pub fn new(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
        }
    }

    /// Source titled after the file name of `path`.
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let title = file_name(&path);
        Self { path, title }
    }

    /// Title shown above the chart; an empty title falls back to the file name.
    pub fn display_title(&self) -> String {
        if self.title.trim().is_empty() {
            file_name(&self.path)
        } else {
            self.title.clone()
        }
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_owned())
}

/// Parses the timestamp formats found in Series Logs and pub/sub payloads.
///
/// RFC 3339 strings keep their offset; naive ISO-8601 strings are read as local wall-clock
/// time. Returns `None` for anything else, including local times skipped by a DST jump.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }
    NAIVE_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(raw, fmt)
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
    })
}

/// ISO-8601 with microseconds and the local offset, e.g. `2026-10-19T14:03:07.250113+02:00`.
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Seconds since the Unix epoch, the x coordinate used by both chart backends.
pub fn epoch_seconds(time: &DateTime<Local>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_micros()) / 1_000_000.0
}

/// Formats an epoch-seconds coordinate with a strftime pattern in local time.
pub fn format_epoch(seconds: f64, pattern: &str) -> String {
    if !seconds.is_finite() {
        return String::new();
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    Local
        .timestamp_opt(whole as i64, nanos)
        .single()
        .map(|t| t.format(pattern).to_string())
        .unwrap_or_default()
}
