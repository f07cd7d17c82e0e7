use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::shaping::load::normalize_header;
use crate::types::{format_timestamp, Sample};

pub const HEADER_WITH_PH: [&str; 3] = ["time", "value", "pH"];

#[derive(Debug, Error)]
pub enum LogError {
    #[error("series log '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("series log '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Append-only writer for one Series Log.
///
/// The file is reopened for every row so a reader never sees a writer holding it, and a crash
/// loses at most the row being written.
#[derive(Debug, Clone)]
pub struct SeriesLog {
    path: PathBuf,
    with_ph: bool,
}

impl SeriesLog {
    /// Opens `path`, writing the `time,value,pH` header if the file is new or empty.
    ///
    /// An existing log keeps its header; a log without a `pH` column gets raw rows only.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LogError::Io {
                path: path.clone(),
                source,
            })?;
        }

        let has_content = fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
        let with_ph = if has_content {
            existing_header_has_ph(&path)?
        } else {
            let mut writer = csv::Writer::from_path(&path).map_err(|source| LogError::Csv {
                path: path.clone(),
                source,
            })?;
            writer
                .write_record(HEADER_WITH_PH)
                .and_then(|_| writer.flush().map_err(csv::Error::from))
                .map_err(|source| LogError::Csv {
                    path: path.clone(),
                    source,
                })?;
            info!("Created series log {}", path.display());
            true
        };
        Ok(Self { path, with_ph })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether rows carry the derived `pH` field.
    pub fn with_ph(&self) -> bool {
        self.with_ph
    }

    /// Appends one row and closes the file again. A missing pH is an empty field.
    pub fn append(&self, sample: &Sample) -> Result<(), LogError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|source| LogError::Io {
                path: self.path.clone(),
                source,
            })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let time = format_timestamp(&sample.time);
        let value = sample.value.to_string();
        let result = if self.with_ph {
            let ph = sample.ph.map(|v| v.to_string()).unwrap_or_default();
            writer.write_record([time.as_str(), value.as_str(), ph.as_str()])
        } else {
            writer.write_record([time.as_str(), value.as_str()])
        };
        result
            .and_then(|_| writer.flush().map_err(csv::Error::from))
            .map_err(|source| LogError::Csv {
                path: self.path.clone(),
                source,
            })
    }
}

fn existing_header_has_ph(path: &Path) -> Result<bool, LogError> {
    let file = File::open(path).map_err(|source| LogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = reader.headers().map_err(|source| LogError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(headers.iter().any(|h| normalize_header(h) == "ph"))
}
