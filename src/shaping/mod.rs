//! Windowing and shaping of Series Logs into renderable charts.
//!
//! `shape` runs the whole pipeline on every refresh: load, validate, sort, cut to the trailing
//! window, pick and smooth the series, then scale the axes.

pub mod config;
pub mod error;
pub mod load;
pub mod smoothing;
pub mod view;

use std::path::Path;

use chrono::{DateTime, Local};
use log::debug;

pub use config::{TimeRange, ViewConfig, XAxisScheme, YLimits};
pub use error::ShapeError;
pub use load::{load_series, DroppedRows, LoadedSeries};
pub use smoothing::MovingAverage;
pub use view::{ShapedPoint, ShapedSeries, YDomain};

use crate::types::SeriesChoice;

/// Point markers are drawn only up to this many rows in the window.
pub const POINT_MARKER_LIMIT: usize = 100;

/// Shapes the log at `path` against the current wall-clock time.
pub fn shape(path: &Path, view: &ViewConfig) -> Result<ShapedSeries, ShapeError> {
    shape_at(path, view, Local::now())
}

/// Shapes the log at `path` with the window ending at `now`.
pub fn shape_at(
    path: &Path,
    view: &ViewConfig,
    now: DateTime<Local>,
) -> Result<ShapedSeries, ShapeError> {
    let loaded = load_series(path)?;
    if !loaded.dropped.is_empty() {
        debug!("'{}': {}", path.display(), loaded.dropped.describe());
    }
    shape_loaded(loaded, view, now)
}

/// Pipeline after loading: sort, window, select, smooth, scale.
pub fn shape_loaded(
    loaded: LoadedSeries,
    view: &ViewConfig,
    now: DateTime<Local>,
) -> Result<ShapedSeries, ShapeError> {
    let LoadedSeries {
        mut samples,
        dropped,
        ..
    } = loaded;
    // Stable: equal timestamps keep file order, so the last row is the newest append.
    samples.sort_by_key(|s| s.time);

    let cutoff = now - view.time_range.duration();
    samples.retain(|s| s.time >= cutoff);
    if samples.is_empty() {
        return Err(ShapeError::Empty(view.time_range));
    }

    let selected: Vec<Option<f64>> = samples
        .iter()
        .map(|s| match view.series {
            SeriesChoice::Raw => Some(s.value),
            SeriesChoice::Derived => s.ph,
        })
        .collect();
    if selected.iter().all(Option::is_none) {
        return Err(ShapeError::NoDerivedData);
    }

    let plotted = MovingAverage::new(view.smoothing()).apply(&selected);
    // Manual limits that are not finite fall back to the auto-scaled domain.
    let y_domain = match view.y_limits.map(YDomain::from).filter(YDomain::is_finite) {
        Some(domain) => domain,
        None => YDomain::padded(plotted.iter().flatten().copied())
            .ok_or(ShapeError::Empty(view.time_range))?,
    };
    let latest_value = selected.iter().rev().find_map(|v| *v);
    let show_points = samples.len() <= POINT_MARKER_LIMIT;

    let rows = samples
        .into_iter()
        .zip(plotted)
        .map(|(s, plotted)| ShapedPoint {
            time: s.time,
            value: s.value,
            ph: s.ph,
            plotted,
        })
        .collect();

    Ok(ShapedSeries {
        rows,
        selected_field: view.series,
        time_range: view.time_range,
        y_domain,
        x_axis: view.time_range.axis_scheme(),
        show_points,
        latest_value,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::format_timestamp;
    use chrono::Duration;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_log(dir: &TempDir, name: &str, header: &str, rows: &[String]) -> PathBuf {
        let path = dir.path().join(name);
        let mut body = format!("{header}\n");
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        fs::write(&path, body).unwrap();
        path
    }

    fn at(now: DateTime<Local>, seconds_ago: i64) -> String {
        format_timestamp(&(now - Duration::seconds(seconds_ago)))
    }

    fn raw_view() -> ViewConfig {
        ViewConfig::default()
    }

    #[test]
    fn two_point_log_gets_padded_domain() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let path = write_log(
            &dir,
            "a.csv",
            "time,value",
            &[format!("{},10", at(now, 120)), format!("{},50", at(now, 60))],
        );
        let shaped = shape_at(&path, &raw_view(), now).unwrap();
        assert!((shaped.y_domain.min - 6.0).abs() < 1e-9);
        assert!((shaped.y_domain.max - 54.0).abs() < 1e-9);
        assert_eq!(shaped.latest_value, Some(50.0));
        assert_eq!(shaped.selected_field, SeriesChoice::Raw);
        assert_eq!(shaped.x_axis, TimeRange::LastHour.axis_scheme());
    }

    #[test]
    fn bad_row_is_dropped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let path = write_log(
            &dir,
            "a.csv",
            "time,value",
            &["bad,notanumber".to_owned(), format!("{},42.5", at(now, 5))],
        );
        let shaped = shape_at(&path, &raw_view(), now).unwrap();
        assert_eq!(shaped.dropped.rows, 1);
        assert_eq!(shaped.rows.len(), 1);
        assert_eq!(shaped.rows[0].value, 42.5);
    }

    #[test]
    fn empty_ph_column_is_not_derived_data() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let path = write_log(
            &dir,
            "a.csv",
            "time,value,pH",
            &[format!("{},1500,", at(now, 30)), format!("{},1510,", at(now, 20))],
        );
        let view = ViewConfig {
            series: SeriesChoice::Derived,
            ..raw_view()
        };
        assert_eq!(shape_at(&path, &view, now), Err(ShapeError::NoDerivedData));

        let no_column = write_log(&dir, "b.csv", "time,value", &[format!("{},1500", at(now, 30))]);
        assert_eq!(shape_at(&no_column, &view, now), Err(ShapeError::NoDerivedData));
    }

    #[test]
    fn stale_log_is_empty_for_every_window() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let two_days = 2 * 24 * 3600;
        let path = write_log(
            &dir,
            "a.csv",
            "time,value",
            &[format!("{},1", at(now, two_days)), format!("{},2", at(now, two_days - 60))],
        );
        for range in TimeRange::ALL {
            let view = ViewConfig {
                time_range: range,
                ..raw_view()
            };
            assert_eq!(shape_at(&path, &view, now), Err(ShapeError::Empty(range)));
        }
    }

    #[test]
    fn point_markers_only_on_sparse_windows() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let dense: Vec<String> = (0..150).map(|i| format!("{},{}", at(now, 150 - i), i)).collect();
        let sparse: Vec<String> = (0..80).map(|i| format!("{},{}", at(now, 80 - i), i)).collect();
        let dense = write_log(&dir, "dense.csv", "time,value", &dense);
        let sparse = write_log(&dir, "sparse.csv", "time,value", &sparse);
        assert!(!shape_at(&dense, &raw_view(), now).unwrap().show_points);
        assert!(shape_at(&sparse, &raw_view(), now).unwrap().show_points);
    }

    #[test]
    fn output_is_sorted_and_ties_keep_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let tie = at(now, 30);
        let path = write_log(
            &dir,
            "a.csv",
            "time,value",
            &[
                format!("{},3", at(now, 10)),
                format!("{tie},1"),
                format!("{},0", at(now, 50)),
                format!("{tie},2"),
            ],
        );
        let shaped = shape_at(&path, &raw_view(), now).unwrap();
        assert!(shaped.rows.windows(2).all(|w| w[0].time <= w[1].time));
        let values: Vec<f64> = shaped.rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn shaping_is_idempotent_for_fixed_now() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let rows: Vec<String> = (0..20)
            .map(|i| format!("{},{},{}", at(now, 200 - i * 10), 1500 + i, 7.0 + i as f64 / 10.0))
            .collect();
        let path = write_log(&dir, "a.csv", "time,value,pH", &rows);
        let view = ViewConfig {
            series: SeriesChoice::Derived,
            smoothing_window: 4,
            ..raw_view()
        };
        assert_eq!(shape_at(&path, &view, now), shape_at(&path, &view, now));
    }

    #[test]
    fn window_cuts_old_rows() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let path = write_log(
            &dir,
            "a.csv",
            "time,value",
            &[format!("{},100", at(now, 90)), format!("{},5", at(now, 30))],
        );
        let view = ViewConfig {
            time_range: TimeRange::LastMinute,
            ..raw_view()
        };
        let shaped = shape_at(&path, &view, now).unwrap();
        assert_eq!(shaped.rows.len(), 1);
        assert_eq!(shaped.x_axis.format, "%H:%M:%S");
        // constant single point: padding from magnitude
        assert!((shaped.y_domain.min - 4.5).abs() < 1e-9);
        assert!((shaped.y_domain.max - 5.5).abs() < 1e-9);
    }

    #[test]
    fn manual_limits_are_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let path = write_log(&dir, "a.csv", "time,value", &[format!("{},500", at(now, 5))]);
        let view = ViewConfig {
            y_limits: Some(YLimits { min: 0.0, max: 100.0 }),
            ..raw_view()
        };
        let shaped = shape_at(&path, &view, now).unwrap();
        assert_eq!(shaped.y_domain, YDomain { min: 0.0, max: 100.0 });
    }

    #[test]
    fn extreme_values_shape_to_a_drawable_domain() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let path = write_log(
            &dir,
            "huge.csv",
            "time,value",
            &[format!("{},1e308", at(now, 20)), format!("{},-1e308", at(now, 10))],
        );
        let view = ViewConfig {
            smoothing_window: 2,
            ..raw_view()
        };
        let shaped = shape_at(&path, &view, now).unwrap();
        assert!(shaped.y_domain.is_drawable());
        assert_eq!(shaped.rows[1].plotted, Some(0.0));
        assert_eq!(shaped.latest_value, Some(-1e308));

        let infinite_limits = ViewConfig {
            y_limits: Some(YLimits {
                min: f64::NEG_INFINITY,
                max: 1.0,
            }),
            ..raw_view()
        };
        let shaped = shape_at(&path, &infinite_limits, now).unwrap();
        assert!(shaped.y_domain.is_drawable());
    }

    #[test]
    fn smoothing_feeds_plot_but_not_latest_value() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let rows: Vec<String> = [10, 20, 30, 40]
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{},{v}", at(now, 40 - i as i64 * 10)))
            .collect();
        let path = write_log(&dir, "a.csv", "time,value", &rows);
        let view = ViewConfig {
            smoothing_window: 2,
            ..raw_view()
        };
        let shaped = shape_at(&path, &view, now).unwrap();
        let plotted: Vec<Option<f64>> = shaped.rows.iter().map(|r| r.plotted).collect();
        assert_eq!(plotted, vec![Some(10.0), Some(15.0), Some(25.0), Some(35.0)]);
        assert_eq!(shaped.latest_value, Some(40.0));
        assert!((shaped.y_domain.min - 7.5).abs() < 1e-9);
        assert!((shaped.y_domain.max - 37.5).abs() < 1e-9);
    }

    #[test]
    fn latest_derived_value_scans_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let path = write_log(
            &dir,
            "a.csv",
            "time,value,pH",
            &[
                format!("{},1500,6.80", at(now, 30)),
                format!("{},1505,6.85", at(now, 20)),
                format!("{},1510,", at(now, 10)),
            ],
        );
        let view = ViewConfig {
            series: SeriesChoice::Derived,
            ..raw_view()
        };
        let shaped = shape_at(&path, &view, now).unwrap();
        assert_eq!(shaped.latest_value, Some(6.85));
        assert_eq!(shaped.plot_points().len(), 2);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        assert_eq!(
            shape(&path, &raw_view()),
            Err(ShapeError::NotFound(path.clone()))
        );
    }
}
