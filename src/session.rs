//! Operator session: chart sources and view settings, passed explicitly into every pass.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shaping::{ViewConfig, YLimits};
use crate::types::ChartSource;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session file '{path}' is not valid: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    /// Charts in display order.
    pub sources: Vec<ChartSource>,
    pub view: ViewConfig,
    pub refresh_interval_secs: u64,
    /// Last values typed into the manual y-limit fields, kept while the toggle is off.
    pub manual_limits: YLimits,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            view: ViewConfig::default(),
            refresh_interval_secs: 5,
            manual_limits: YLimits::default(),
        }
    }
}

impl SessionState {
    /// One source per `*.csv` in `data_dir` (sorted by name), or `default_log` if there is none.
    pub fn from_folder(data_dir: &Path, default_log: &Path) -> Self {
        let mut logs: Vec<PathBuf> = match fs::read_dir(data_dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_file()
                        && path
                            .extension()
                            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
                })
                .collect(),
            Err(e) => {
                warn!("Cannot scan '{}': {e}", data_dir.display());
                Vec::new()
            }
        };
        logs.sort_by_key(|path| path.file_name().map(|n| n.to_os_string()));
        if logs.is_empty() {
            logs.push(default_log.to_path_buf());
        }
        Self {
            sources: logs
                .into_iter()
                .map(|path| ChartSource::from_path(path.display().to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let text = fs::read_to_string(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SessionError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let io_error = |source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SessionError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_error)
    }

    /// Saved session if one exists and parses, otherwise a fresh folder scan.
    pub fn load_or_scan(
        session: Option<&Path>,
        data_dir: &Path,
        default_log: &Path,
        refresh_interval_secs: u64,
    ) -> Self {
        if let Some(path) = session.filter(|p| p.exists()) {
            match Self::load(path) {
                Ok(state) => {
                    info!("Restored session from {}", path.display());
                    return state;
                }
                Err(e) => warn!("{e}; starting a new session"),
            }
        }
        Self {
            refresh_interval_secs: refresh_interval_secs.max(1),
            ..Self::from_folder(data_dir, default_log)
        }
    }

    pub fn add_source(&mut self, source: ChartSource) {
        self.sources.push(source);
    }

    pub fn remove_source(&mut self, index: usize) -> Option<ChartSource> {
        (index < self.sources.len()).then(|| self.sources.remove(index))
    }

    /// Never below one second.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn manual_limits_enabled(&self) -> bool {
        self.view.y_limits.is_some()
    }

    /// Turns the manual y-limits on or off, keeping the entered values either way.
    pub fn set_manual_limits(&mut self, enabled: bool) {
        if let Some(current) = self.view.y_limits {
            self.manual_limits = current;
        }
        self.view.y_limits = enabled.then_some(self.manual_limits);
    }

    pub fn update_manual_limits(&mut self, limits: YLimits) {
        self.manual_limits = limits;
        if self.view.y_limits.is_some() {
            self.view.y_limits = Some(limits);
        }
    }
}
