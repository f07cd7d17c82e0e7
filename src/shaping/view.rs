use chrono::{DateTime, Local};

use crate::shaping::{DroppedRows, TimeRange, XAxisScheme, YLimits};
use crate::types::{epoch_seconds, SeriesChoice};

/// Fraction of the data span added above and below the auto-scaled y axis.
pub const DOMAIN_PADDING: f64 = 0.10;

/// Largest magnitude an auto-scaled bound takes, so `max - min` stays finite.
const DOMAIN_LIMIT: f64 = f64::MAX / 2.0;

/// Value-axis bounds of one chart.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YDomain {
    pub min: f64,
    pub max: f64,
}

impl YDomain {
    /// Data range widened by 10% on each side.
    ///
    /// A constant series pads by 10% of its magnitude instead, or by 1.0 around zero.
    /// Non-finite values are ignored and the bounds saturate at half the `f64` range.
    pub fn padded(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let (min, max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        // halved span cannot overflow, unlike `max - min`
        let mut padding = (max / 2.0 - min / 2.0) * (2.0 * DOMAIN_PADDING);
        if padding <= 0.0 {
            padding = if min != 0.0 {
                min.abs() * DOMAIN_PADDING
            } else {
                1.0
            };
        }
        Some(Self {
            min: (min - padding).max(-DOMAIN_LIMIT),
            max: (max + padding).min(DOMAIN_LIMIT),
        })
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Finite, non-empty, and with a span that fits in an `f64`.
    pub fn is_drawable(&self) -> bool {
        self.is_finite() && self.min < self.max && (self.max - self.min).is_finite()
    }
}

impl From<YLimits> for YDomain {
    fn from(limits: YLimits) -> Self {
        Self {
            min: limits.min,
            max: limits.max,
        }
    }
}

/// One row of the filtered window.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapedPoint {
    pub time: DateTime<Local>,
    pub value: f64,
    pub ph: Option<f64>,
    /// Selected field after smoothing; this is what gets drawn.
    pub plotted: Option<f64>,
}

/// Renderable view of one Series Log over the trailing window.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapedSeries {
    pub rows: Vec<ShapedPoint>,
    pub selected_field: SeriesChoice,
    pub time_range: TimeRange,
    pub y_domain: YDomain,
    pub x_axis: XAxisScheme,
    pub show_points: bool,
    /// Most recent unsmoothed value of the selected field.
    pub latest_value: Option<f64>,
    pub dropped: DroppedRows,
}

impl ShapedSeries {
    /// `[epoch_seconds, value]` pairs for every plotted row.
    pub fn plot_points(&self) -> Vec<[f64; 2]> {
        self.rows
            .iter()
            .filter_map(|row| row.plotted.map(|y| [epoch_seconds(&row.time), y]))
            .collect()
    }

    /// Both axes have finite, non-empty ranges.
    pub fn is_drawable(&self) -> bool {
        self.y_domain.is_drawable()
            && self
                .time_bounds()
                .is_some_and(|(start, end)| start.is_finite() && end.is_finite())
    }

    /// First and last timestamp as epoch seconds.
    pub fn time_bounds(&self) -> Option<(f64, f64)> {
        let first = self.rows.first()?;
        let last = self.rows.last()?;
        Some((epoch_seconds(&first.time), epoch_seconds(&last.time)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extreme_values_keep_a_finite_domain() {
        let domain = YDomain::padded([1e308, -1e308]).unwrap();
        assert!(domain.is_drawable());
        assert_eq!(domain.max, f64::MAX / 2.0);
        assert_eq!(domain.min, -f64::MAX / 2.0);

        let small = YDomain::padded([1e300, -1e300]).unwrap();
        assert!((small.max / 1.2e300 - 1.0).abs() < 1e-12);

        let skipped = YDomain::padded([f64::NAN, 1.0, f64::INFINITY, 3.0]).unwrap();
        assert!((skipped.min - 0.8).abs() < 1e-9);
        assert!((skipped.max - 3.2).abs() < 1e-9);
        assert!(!YDomain { min: 2.0, max: 2.0 }.is_drawable());
        assert!(!YDomain {
            min: f64::MIN,
            max: f64::MAX
        }
        .is_drawable());
    }

    #[test]
    fn pads_by_ten_percent_of_span() {
        let domain = YDomain::padded([10.0, 50.0, 30.0]).unwrap();
        assert!((domain.min - 6.0).abs() < 1e-9);
        assert!((domain.max - 54.0).abs() < 1e-9);
    }

    #[test]
    fn constant_series_falls_back() {
        let domain = YDomain::padded([-20.0, -20.0]).unwrap();
        assert!((domain.min + 22.0).abs() < 1e-9);
        assert!((domain.max + 18.0).abs() < 1e-9);
        assert_eq!(
            YDomain::padded([0.0]),
            Some(YDomain {
                min: -1.0,
                max: 1.0
            })
        );
        assert_eq!(YDomain::padded(std::iter::empty()), None);
    }
}
