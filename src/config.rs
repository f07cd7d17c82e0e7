//! Typed command-line and environment configuration for the three binaries.
//!
//! Every option can be given as a flag or through the environment variable the deployment
//! scripts already export, e.g. `TF_UID=27eU phscope-collect`.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, ValueEnum, ValueHint};
use log::warn;
use thiserror::Error;

use crate::calibration::Calibration;
use crate::drivers::tinkerforge::{decode_uid, DEFAULT_PORT};
use crate::drivers::SourceError;
use crate::pubsub::BrokerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error(transparent)]
    Uid(#[from] SourceError),
}

/// Installs `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct BrokerArgs {
    /// MQTT broker host
    #[arg(id = "mqtt_host", long = "mqtt-host", env = "MQTT_HOST", default_value = "localhost")]
    pub host: String,

    #[arg(id = "mqtt_port", long = "mqtt-port", env = "MQTT_PORT", default_value_t = 1883)]
    pub port: u16,

    #[arg(id = "mqtt_username", long = "mqtt-username", env = "MQTT_USERNAME")]
    pub username: Option<String>,

    #[arg(id = "mqtt_password", long = "mqtt-password", env = "MQTT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Channel the samples are published on
    #[arg(long, env = "PUBSUB_CHANNEL", default_value = "analog_in_channel")]
    pub channel: String,

    /// Fixed client id; a random one is generated when unset
    #[arg(id = "mqtt_client_id", long = "mqtt-client-id", env = "MQTT_CLIENT_ID")]
    pub client_id: Option<String>,
}

impl BrokerArgs {
    pub fn broker(&self) -> BrokerConfig {
        BrokerConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            channel: self.channel.clone(),
            client_id: self.client_id.clone(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Empty("MQTT_HOST"));
        }
        if self.channel.trim().is_empty() {
            return Err(ConfigError::Empty("PUBSUB_CHANNEL"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Analog In 3.0 bricklet behind brickd
    Tinkerforge,
    /// Generated sine wave, no hardware needed
    Simulated,
}

/// Sample ingestion daemon.
#[derive(Parser, Debug, Clone)]
#[command(name = "phscope-collect", version, about = "Collect voltage samples into a CSV log")]
pub struct CollectorConfig {
    #[arg(long, value_enum, env = "SOURCE", default_value_t = SourceKind::Tinkerforge)]
    pub source: SourceKind,

    #[arg(long, env = "TF_HOST", default_value = "localhost")]
    pub host: String,

    #[arg(long, env = "TF_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Bricklet UID, also substituted for `{uid}` in the CSV path
    #[arg(long, env = "TF_UID", default_value = "27eU")]
    pub uid: String,

    /// Connection timeout in seconds
    #[arg(long, env = "TF_TIMEOUT", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    #[arg(long, env = "CSV_FILE", default_value = "sensor_data.csv", value_hint = ValueHint::FilePath)]
    pub csv_file: String,

    /// Seconds between samples
    #[arg(long, env = "INTERVAL", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Publish every sample to the broker
    #[arg(
        long,
        env = "PUBLISH",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub publish: bool,

    #[arg(long, env = "CAL_V_LOW")]
    pub cal_v_low: Option<f64>,

    #[arg(long, env = "CAL_V_HIGH")]
    pub cal_v_high: Option<f64>,

    #[arg(long, env = "CAL_PH_LOW")]
    pub cal_ph_low: Option<f64>,

    #[arg(long, env = "CAL_PH_HIGH")]
    pub cal_ph_high: Option<f64>,

    #[command(flatten)]
    pub broker: BrokerArgs,
}

impl CollectorConfig {
    pub fn calibration(&self) -> Calibration {
        Calibration::new(
            self.cal_v_low,
            self.cal_v_high,
            self.cal_ph_low,
            self.cal_ph_high,
        )
    }

    /// CSV path with `{uid}` replaced, so several collectors never share a file.
    pub fn log_path(&self) -> PathBuf {
        PathBuf::from(self.csv_file.replace("{uid}", &self.uid))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.csv_file.trim().is_empty() {
            return Err(ConfigError::Empty("CSV_FILE"));
        }
        if self.source == SourceKind::Tinkerforge {
            if self.host.trim().is_empty() {
                return Err(ConfigError::Empty("TF_HOST"));
            }
            decode_uid(&self.uid)?;
        }
        if self.publish {
            self.broker.validate()?;
        }
        if self.calibration().is_partial() {
            warn!("Calibration is incomplete or degenerate; pH will not be derived.");
        }
        Ok(())
    }
}

/// Pub/sub to CSV relay daemon.
#[derive(Parser, Debug, Clone)]
#[command(name = "phscope-relay", version, about = "Append published samples to a CSV log")]
pub struct RelayConfig {
    #[arg(long, env = "CSV_FILE_RECEIVER", default_value = "sensor_data.csv", value_hint = ValueHint::FilePath)]
    pub csv_file: PathBuf,

    #[command(flatten)]
    pub broker: BrokerArgs,
}

impl RelayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.csv_file.as_os_str().is_empty() {
            return Err(ConfigError::Empty("CSV_FILE_RECEIVER"));
        }
        self.broker.validate()
    }
}

/// Live chart dashboard.
#[derive(Parser, Debug, Clone)]
#[command(name = "phscope", version, about = "Live charts of sensor CSV logs")]
pub struct DashboardConfig {
    #[arg(long, env = "DASHBOARD_TITLE", default_value = "Live Sensor Data Chart")]
    pub title: String,

    /// Folder scanned for `*.csv` logs on first start
    #[arg(long, env = "DATA_DIR", default_value = "data", value_hint = ValueHint::DirPath)]
    pub data_dir: PathBuf,

    /// Log charted when the data folder holds none
    #[arg(long, env = "CSV_FILE_RECEIVER", default_value = "sensor_data.csv", value_hint = ValueHint::FilePath)]
    pub default_log: PathBuf,

    /// Seconds between refreshes
    #[arg(long, env = "REFRESH_INTERVAL", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_interval: u64,

    /// JSON file the operator session is loaded from and saved to
    #[arg(long, env = "PHSCOPE_SESSION", value_hint = ValueHint::FilePath)]
    pub session: Option<PathBuf>,

    /// Render headless into this PNG instead of opening a window
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub snapshot: Option<PathBuf>,

    /// With --snapshot: render a single pass and exit
    #[arg(long, action = ArgAction::SetTrue, requires = "snapshot")]
    pub once: bool,
}

impl DashboardConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval.max(1))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.title.trim().is_empty() {
            return Err(ConfigError::Empty("DASHBOARD_TITLE"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_defaults() {
        let config = CollectorConfig::try_parse_from(["phscope-collect"]).unwrap();
        assert_eq!(config.port, 4223);
        assert_eq!(config.interval(), Duration::from_secs(5));
        assert!(config.publish);
        assert_eq!(config.broker.channel, "analog_in_channel");
        assert!(!config.calibration().is_complete());
        config.validate().unwrap();
    }

    #[test]
    fn uid_placeholder_in_log_path() {
        let config = CollectorConfig::try_parse_from([
            "phscope-collect",
            "--uid",
            "Hx9",
            "--csv-file",
            "logs/sensor_{uid}.csv",
        ])
        .unwrap();
        assert_eq!(config.log_path(), PathBuf::from("logs/sensor_Hx9.csv"));
    }

    #[test]
    fn publish_accepts_boolish_values() {
        for (raw, expected) in [("false", false), ("0", false), ("no", false), ("yes", true)] {
            let config =
                CollectorConfig::try_parse_from(["phscope-collect", "--publish", raw]).unwrap();
            assert_eq!(config.publish, expected, "{raw}");
        }
    }

    #[test]
    fn interval_below_one_second_is_rejected() {
        assert!(CollectorConfig::try_parse_from(["phscope-collect", "--interval", "0"]).is_err());
        assert!(DashboardConfig::try_parse_from(["phscope", "--refresh-interval", "0"]).is_err());
    }

    #[test]
    fn calibration_from_flags() {
        let config = CollectorConfig::try_parse_from([
            "phscope-collect",
            "--cal-v-low",
            "1000",
            "--cal-v-high",
            "2000",
            "--cal-ph-low",
            "4",
            "--cal-ph-high",
            "10",
        ])
        .unwrap();
        assert!(config.calibration().is_complete());
    }

    #[test]
    fn bad_uid_fails_validation() {
        let config =
            CollectorConfig::try_parse_from(["phscope-collect", "--uid", "0OIl"]).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Uid(_))));

        let simulated = CollectorConfig::try_parse_from([
            "phscope-collect",
            "--uid",
            "0OIl",
            "--source",
            "simulated",
        ])
        .unwrap();
        simulated.validate().unwrap();
    }

    #[test]
    fn once_requires_snapshot() {
        assert!(DashboardConfig::try_parse_from(["phscope", "--once"]).is_err());
        let config =
            DashboardConfig::try_parse_from(["phscope", "--snapshot", "out.png", "--once"])
                .unwrap();
        assert!(config.once);
        assert_eq!(config.title, "Live Sensor Data Chart");
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
    }

    #[test]
    fn relay_uses_receiver_file() {
        let config =
            RelayConfig::try_parse_from(["phscope-relay", "--csv-file", "in.csv"]).unwrap();
        assert_eq!(config.csv_file, PathBuf::from("in.csv"));
        config.validate().unwrap();
    }
}
