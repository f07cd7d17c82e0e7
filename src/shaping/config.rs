use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::SeriesChoice;

/// Trailing window of data shown on every chart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    LastMinute,
    Last10Minutes,
    Last20Minutes,
    #[default]
    LastHour,
    Last12Hours,
    LastDay,
}

impl TimeRange {
    pub const ALL: [TimeRange; 6] = [
        TimeRange::LastMinute,
        TimeRange::Last10Minutes,
        TimeRange::Last20Minutes,
        TimeRange::LastHour,
        TimeRange::Last12Hours,
        TimeRange::LastDay,
    ];

    pub fn duration(self) -> Duration {
        match self {
            TimeRange::LastMinute => Duration::minutes(1),
            TimeRange::Last10Minutes => Duration::minutes(10),
            TimeRange::Last20Minutes => Duration::minutes(20),
            TimeRange::LastHour => Duration::hours(1),
            TimeRange::Last12Hours => Duration::hours(12),
            TimeRange::LastDay => Duration::days(1),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeRange::LastMinute => "Last 1 minute",
            TimeRange::Last10Minutes => "Last 10 minutes",
            TimeRange::Last20Minutes => "Last 20 minutes",
            TimeRange::LastHour => "Last 1 hour",
            TimeRange::Last12Hours => "Last 12 hours",
            TimeRange::LastDay => "Last 1 day",
        }
    }

    pub fn axis_scheme(self) -> XAxisScheme {
        let (format, tick_count) = match self {
            TimeRange::LastMinute => ("%H:%M:%S", 6),
            TimeRange::Last10Minutes => ("%H:%M", 10),
            TimeRange::Last20Minutes => ("%H:%M", 4),
            TimeRange::LastHour => ("%H:%M", 12),
            TimeRange::Last12Hours => ("%H:%M", 12),
            TimeRange::LastDay => ("%H:%M", 24),
        };
        XAxisScheme { format, tick_count }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Time label format and approximate tick count of the x axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XAxisScheme {
    /// strftime pattern for tick labels.
    pub format: &'static str,
    pub tick_count: usize,
}

impl XAxisScheme {
    /// Evenly spaced tick positions (epoch seconds) covering `[start, end]`.
    ///
    /// Spacing is at least one second so the labels never repeat.
    pub fn tick_positions(&self, start: f64, end: f64) -> Vec<f64> {
        if !(start.is_finite() && end.is_finite()) || end < start {
            return Vec::new();
        }
        let count = self.tick_count.max(1);
        let step = ((end - start) / count as f64).max(1.0);
        let first = (start / step).ceil() * step;
        (0..=count)
            .map(|i| first + step * i as f64)
            .take_while(|t| *t <= end)
            .collect()
    }
}

/// Manually entered y-axis bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct YLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for YLimits {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
        }
    }
}

/// Operator view settings applied to every chart in a render pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub time_range: TimeRange,
    pub series: SeriesChoice,
    /// Used verbatim when set, even if data falls outside.
    pub y_limits: Option<YLimits>,
    /// Trailing moving-average window in points.
    pub smoothing_window: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            time_range: TimeRange::default(),
            series: SeriesChoice::default(),
            y_limits: None,
            smoothing_window: 1,
        }
    }
}

impl ViewConfig {
    pub fn smoothing(&self) -> usize {
        self.smoothing_window.max(1)
    }
}
