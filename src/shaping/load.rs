use std::fs::File;
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;

use crate::shaping::ShapeError;
use crate::types::{parse_timestamp, Sample};

/// Rows discarded while reading a log. Never repaired, never defaulted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DroppedRows {
    pub rows: usize,
    pub bad_time: usize,
    pub bad_value: usize,
}

impl DroppedRows {
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn describe(&self) -> String {
        format!(
            "dropped {} rows with bad time and {} with non-numeric value",
            self.bad_time, self.bad_value
        )
    }
}

/// Every valid row of one log, in file order.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedSeries {
    pub samples: Vec<Sample>,
    pub has_ph: bool,
    pub dropped: DroppedRows,
}

/// Column positions resolved from the header row.
struct Columns {
    time: usize,
    value: usize,
    ph: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, Vec<&'static str>> {
        let find = |name: &str| headers.iter().position(|h| normalize_header(h) == name);
        match (find("time"), find("value")) {
            (Some(time), Some(value)) => Ok(Self {
                time,
                value,
                ph: find("ph"),
            }),
            (time, value) => {
                let mut missing = Vec::new();
                if time.is_none() {
                    missing.push("time");
                }
                if value.is_none() {
                    missing.push("value");
                }
                Err(missing)
            }
        }
    }
}

/// Lower-cased header name with all whitespace removed.
pub fn normalize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Reads a Series Log in full.
///
/// A half-written final line (the writer may be mid-append) simply fails to parse and is
/// counted as dropped.
pub fn load_series(path: &Path) -> Result<LoadedSeries, ShapeError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ShapeError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(read_error(path, e)),
    };
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);
    let headers = reader.headers().map_err(|e| read_error(path, e))?.clone();
    let columns = Columns::locate(&headers).map_err(|missing| ShapeError::Schema {
        path: path.to_path_buf(),
        missing,
    })?;

    let mut samples = Vec::new();
    let mut has_ph = false;
    let mut dropped = DroppedRows::default();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!("{}: skipping unreadable row {}: {e}", path.display(), line + 2);
                dropped.rows += 1;
                continue;
            }
        };
        let time = record.get(columns.time).and_then(parse_timestamp);
        let value = parse_number(record.get(columns.value));
        match (time, value) {
            (Some(time), Some(value)) => {
                let ph = columns.ph.and_then(|idx| parse_number(record.get(idx)));
                has_ph |= ph.is_some();
                samples.push(Sample::new(time, value, ph));
            }
            (time, value) => {
                dropped.rows += 1;
                dropped.bad_time += usize::from(time.is_none());
                dropped.bad_value += usize::from(value.is_none());
            }
        }
    }
    Ok(LoadedSeries {
        samples,
        has_ph,
        dropped,
    })
}

fn read_error(path: &Path, err: impl std::fmt::Display) -> ShapeError {
    ShapeError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
