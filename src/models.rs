use std::path::{Path, PathBuf};

use parse_display::{Display, FromStr};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::color::Hsbk;

pub type Color = palette::Srgb<u8>;

/// Name of the configuration file in the user configuration directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Region of the desktop to sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromStr)]
pub enum CaptureTarget {
    /// Every display, composited at its virtual desktop position
    #[display("all")]
    All,
    /// A single display, by index in the display list
    #[display("display:{0}")]
    Monitor(usize),
    /// A rectangle in virtual desktop coordinates
    #[display("{left},{top},{right},{bottom}")]
    Rect {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },
}

impl Default for CaptureTarget {
    fn default() -> Self {
        Self::All
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplePolicy {
    /// Average of all pixels
    Mean,
    /// Most frequent color on a downsampled grid
    Mode,
}

impl Default for SamplePolicy {
    fn default() -> Self {
        Self::Mean
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CaptureConfig {
    #[serde(
        serialize_with = "crate::serde::serialize_display",
        deserialize_with = "crate::serde::deserialize_from_str"
    )]
    pub target: CaptureTarget,
    pub policy: SamplePolicy,
    #[validate(range(min = 1, max = 1000))]
    pub mode_grid: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target: CaptureTarget::All,
            policy: SamplePolicy::Mean,
            mode_grid: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulbKind {
    Lifx,
    Dummy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DummyBulbMode {
    Text,
    Ansi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BulbConfig {
    pub kind: BulbKind,
    /// Address of the bulb, `host` or `host:port`
    #[validate(length(min = 1))]
    pub address: String,
    /// Serial number (MAC address) of the bulb, all bulbs reached by `address` if unset
    pub serial: Option<String>,
    #[validate(range(min = 1, max = 60_000))]
    pub timeout_ms: u64,
    pub dummy_mode: DummyBulbMode,
}

impl Default for BulbConfig {
    fn default() -> Self {
        Self {
            kind: BulbKind::Lifx,
            address: "255.255.255.255:56700".to_owned(),
            serial: None,
            timeout_ms: 500,
            dummy_mode: DummyBulbMode::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_backoff"))]
pub struct MatchConfig {
    #[validate(range(min = 1, max = 3_600_000))]
    pub period_ms: u64,
    /// Periods shorter than this use instant color cuts instead of transitions
    pub instant_threshold_ms: u64,
    pub continuous: bool,
    /// Upper bound on the duration of a single bulb command
    #[validate(range(min = 1, max = 3_600_000))]
    pub call_timeout_ms: u64,
    #[validate(range(min = 1, max = 3_600_000))]
    pub backoff_initial_ms: u64,
    #[validate(range(max = 3_600_000))]
    pub backoff_max_ms: u64,
    pub initial_color: Hsbk,
}

fn validate_backoff(config: &MatchConfig) -> Result<(), ValidationError> {
    if config.backoff_max_ms < config.backoff_initial_ms {
        return Err(ValidationError::new("backoff_max_ms is lower than backoff_initial_ms"));
    }

    Ok(())
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            period_ms: 1000 / 15,
            instant_threshold_ms: 250,
            continuous: true,
            call_timeout_ms: 1000,
            backoff_initial_ms: 50,
            backoff_max_ms: 2000,
            initial_color: Hsbk::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ChartConfig {
    #[validate(range(min = 2, max = 10000))]
    pub history_len: usize,
    #[validate(range(min = 1))]
    pub redraw_ms: u64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            history_len: 100,
            redraw_ms: 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("no user configuration directory")]
    NoConfigDir,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub capture: CaptureConfig,
    #[validate(nested)]
    pub bulb: BulbConfig,
    #[validate(nested)]
    pub matching: MatchConfig,
    #[validate(nested)]
    pub chart: ChartConfig,
}

impl Config {
    /// Path of the default configuration file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|mut path| {
                path.push("lightmatch");
                path.push(CONFIG_FILE_NAME);
                path
            })
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    #[instrument]
    pub async fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let full = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&full)
    }

    /// Load the given configuration file, or the default one
    ///
    /// A missing default configuration file results in the default configuration.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_file(path).await;
        }

        let path = Self::default_path()?;
        if tokio::fs::metadata(&path).await.is_ok() {
            Self::load_file(&path).await
        } else {
            debug!(path = %path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
