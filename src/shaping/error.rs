use std::path::PathBuf;

use thiserror::Error;

use crate::shaping::TimeRange;

/// Why a Series Log could not be shaped into a chart.
///
/// Each variant is scoped to one chart source; the caller shows it in that source's slot.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ShapeError {
    #[error("File '{}' not found.", .0.display())]
    NotFound(PathBuf),
    #[error("CSV '{}' must contain 'time' and 'value' columns (missing: {}).", path.display(), missing.join(", "))]
    Schema {
        path: PathBuf,
        missing: Vec<&'static str>,
    },
    #[error("No data in the selected time range: {0}")]
    Empty(TimeRange),
    #[error("No pH data available in the selected window.")]
    NoDerivedData,
    #[error("Error reading CSV '{}': {message}", path.display())]
    Read { path: PathBuf, message: String },
}
