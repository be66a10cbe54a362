//! Configuration for stream clustering.
//!
//! Two layers live here:
//! - [`Settings`]: the validated, immutable value consumed by one clustering pass
//! - [`Config`]: the persisted defaults and worker tuning of the CLI

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default density radius used when nothing else is configured.
pub const DEFAULT_EPS: f64 = 8.0;

/// Default analysis window length in rows.
pub const DEFAULT_DATA_TICKS: usize = 50;

/// Default number of history entries inspected for highlighting.
pub const DEFAULT_HISTORY_DEPTH: usize = 5;

/// Upper bound on stored history entries, independent of the configured depth.
pub const DEFAULT_HISTORY_BOUND: usize = 20;

/// How dimensions are partitioned into groups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStrategy {
    /// Split the ranked dimensions into this many contiguous slices
    Count(u32),
    /// Density clustering with this neighbourhood radius
    Density(f64),
}

/// Whether flat regions are suppressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoringDataMode {
    #[default]
    Off,
    Standard,
}

/// Parameters of boring-region detection and compression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Relative range below which a local window counts as flat
    pub mean_range: f64,
    /// Size of the local window used for the flatness test
    pub tick_range: usize,
    /// Collapse consecutive boring points into a single gap
    pub save_screen_space: bool,
}

/// Validated settings for one clustering pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub grouping: GroupingStrategy,
    /// Window length in rows; `None` uses the whole buffer
    pub data_ticks: Option<usize>,
    pub boring_mode: BoringDataMode,
    pub compression: Option<CompressionConfig>,
    /// Number of history entries inspected for highlighting
    pub cluster_assignment_history_depth: usize,
}

impl Settings {
    /// Settings with the given grouping strategy and defaults elsewhere.
    pub fn new(grouping: GroupingStrategy) -> Self {
        Self {
            grouping,
            data_ticks: Some(DEFAULT_DATA_TICKS),
            boring_mode: BoringDataMode::Off,
            compression: None,
            cluster_assignment_history_depth: DEFAULT_HISTORY_DEPTH,
        }
    }

    /// Enable standard boring-data suppression.
    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.boring_mode = BoringDataMode::Standard;
        self.compression = Some(compression);
        self
    }

    pub fn with_data_ticks(mut self, data_ticks: Option<usize>) -> Self {
        self.data_ticks = data_ticks.filter(|&t| t > 0);
        self
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.cluster_assignment_history_depth = depth;
        self
    }

    /// Compression parameters, only when suppression is switched on.
    pub fn active_compression(&self) -> Option<&CompressionConfig> {
        match self.boring_mode {
            BoringDataMode::Standard => self.compression.as_ref(),
            BoringDataMode::Off => None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(GroupingStrategy::Density(DEFAULT_EPS))
    }
}

/// Flat settings object as exchanged with forms and stored on disk.
///
/// `clusterCount` and `eps` are mutually exclusive; conversion into
/// [`Settings`] rejects anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_ticks: Option<usize>,
    #[serde(default)]
    pub ignore_boring_data_mode: BoringDataMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_range: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_range: Option<usize>,
    #[serde(default)]
    pub save_screen_space: bool,
    #[serde(default = "default_history_depth")]
    pub cluster_assignment_history_depth: usize,
}

fn default_history_depth() -> usize {
    DEFAULT_HISTORY_DEPTH
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            cluster_count: None,
            eps: Some(DEFAULT_EPS),
            data_ticks: Some(DEFAULT_DATA_TICKS),
            ignore_boring_data_mode: BoringDataMode::Off,
            mean_range: None,
            tick_range: None,
            save_screen_space: false,
            cluster_assignment_history_depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

impl TryFrom<RawSettings> for Settings {
    type Error = ConfigError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        if let Some(eps) = raw.eps {
            if !eps.is_finite() || eps < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "eps",
                    reason: format!("must be a non-negative number, got {eps}"),
                });
            }
        }

        // A zero value counts as "not set", as in the settings forms.
        let count = raw.cluster_count.filter(|&c| c > 0);
        let eps = raw.eps.filter(|&e| e > 0.0);

        let grouping = match (count, eps) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingStrategy),
            (None, None) => return Err(ConfigError::MissingStrategy),
            (Some(count), None) => GroupingStrategy::Count(count),
            (None, Some(eps)) => GroupingStrategy::Density(eps),
        };

        let compression = match (raw.mean_range, raw.tick_range) {
            (Some(mean_range), Some(tick_range)) if mean_range != 0.0 && tick_range > 0 => {
                if !mean_range.is_finite() || mean_range < 0.0 {
                    return Err(ConfigError::InvalidValue {
                        field: "meanRange",
                        reason: format!("must be a non-negative number, got {mean_range}"),
                    });
                }
                Some(CompressionConfig {
                    mean_range,
                    tick_range,
                    save_screen_space: raw.save_screen_space,
                })
            }
            _ => None,
        };

        Ok(Settings {
            grouping,
            data_ticks: raw.data_ticks.filter(|&t| t > 0),
            boring_mode: raw.ignore_boring_data_mode,
            compression,
            cluster_assignment_history_depth: raw.cluster_assignment_history_depth,
        })
    }
}

impl From<&Settings> for RawSettings {
    fn from(settings: &Settings) -> Self {
        let (cluster_count, eps) = match settings.grouping {
            GroupingStrategy::Count(count) => (Some(count), None),
            GroupingStrategy::Density(eps) => (None, Some(eps)),
        };
        Self {
            cluster_count,
            eps,
            data_ticks: settings.data_ticks,
            ignore_boring_data_mode: settings.boring_mode,
            mean_range: settings.compression.map(|c| c.mean_range),
            tick_range: settings.compression.map(|c| c.tick_range),
            save_screen_space: settings
                .compression
                .map(|c| c.save_screen_space)
                .unwrap_or(false),
            cluster_assignment_history_depth: settings.cluster_assignment_history_depth,
        }
    }
}

/// Persisted configuration of the CLI and worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Settings used when no command-line overrides are given
    pub settings: RawSettings,

    /// Minimum interval between primary clustering passes
    #[serde(with = "duration_serde")]
    pub throttle_interval: Duration,

    /// Timeline passes run this many times less often than primary passes
    pub timeline_interval_factor: u32,

    /// Upper bound on stored assignment history entries
    pub history_bound: usize,

    /// Replace an inconsistent density result with one all-dimensions group
    pub fallback_to_single_group: bool,

    /// Path for storing processing statistics
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stream-clusters");

        Self {
            settings: RawSettings::default(),
            throttle_interval: Duration::from_millis(2000),
            timeline_interval_factor: 5,
            history_bound: DEFAULT_HISTORY_BOUND,
            fallback_to_single_group: true,
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stream-clusters")
            .join("config.json")
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Validated settings from the stored defaults.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        Settings::try_from(self.settings.clone())
    }

    /// Interval between timeline passes.
    pub fn timeline_interval(&self) -> Duration {
        self.throttle_interval * self.timeline_interval_factor.max(1)
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    /// Both `clusterCount` and `eps` are set
    ConflictingStrategy,
    /// Neither `clusterCount` nor `eps` is set
    MissingStrategy,
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::ConflictingStrategy => {
                write!(f, "Only one of clusterCount and eps may be set")
            }
            ConfigError::MissingStrategy => {
                write!(f, "One of clusterCount or eps must be set")
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for {field}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, stored as milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawSettings {
        RawSettings {
            eps: None,
            ..RawSettings::default()
        }
    }

    #[test]
    fn test_count_strategy_parsing() {
        let settings = Settings::try_from(RawSettings {
            cluster_count: Some(3),
            ..raw()
        })
        .unwrap();

        assert_eq!(settings.grouping, GroupingStrategy::Count(3));
        assert_eq!(settings.data_ticks, Some(DEFAULT_DATA_TICKS));
        assert!(settings.active_compression().is_none());
    }

    #[test]
    fn test_conflicting_strategy_rejected() {
        let result = Settings::try_from(RawSettings {
            cluster_count: Some(3),
            eps: Some(1.5),
            ..raw()
        });
        assert!(matches!(result, Err(ConfigError::ConflictingStrategy)));
    }

    #[test]
    fn test_missing_strategy_rejected() {
        assert!(matches!(
            Settings::try_from(raw()),
            Err(ConfigError::MissingStrategy)
        ));

        // Zero values are treated as absent.
        let zeros = RawSettings {
            cluster_count: Some(0),
            eps: Some(0.0),
            ..raw()
        };
        assert!(matches!(
            Settings::try_from(zeros),
            Err(ConfigError::MissingStrategy)
        ));
    }

    #[test]
    fn test_negative_eps_rejected() {
        let result = Settings::try_from(RawSettings {
            eps: Some(-1.0),
            ..raw()
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "eps", .. })
        ));
    }

    #[test]
    fn test_compression_requires_both_fields() {
        let partial = RawSettings {
            eps: Some(2.0),
            ignore_boring_data_mode: BoringDataMode::Standard,
            mean_range: Some(0.1),
            ..raw()
        };
        assert!(Settings::try_from(partial).unwrap().compression.is_none());

        let full = RawSettings {
            eps: Some(2.0),
            ignore_boring_data_mode: BoringDataMode::Standard,
            mean_range: Some(0.1),
            tick_range: Some(3),
            save_screen_space: true,
            data_ticks: Some(0),
            ..raw()
        };
        let settings = Settings::try_from(full).unwrap();
        let compression = settings.active_compression().unwrap();
        assert_eq!(compression.tick_range, 3);
        assert!(compression.save_screen_space);
        assert_eq!(settings.data_ticks, None);
    }

    #[test]
    fn test_raw_settings_json_names() {
        let json = r#"{
            "clusterCount": 2,
            "dataTicks": 30,
            "ignoreBoringDataMode": "standard",
            "meanRange": 0.05,
            "tickRange": 5,
            "saveScreenSpace": true
        }"#;
        let raw: RawSettings = serde_json::from_str(json).unwrap();
        assert_eq!(raw.cluster_assignment_history_depth, DEFAULT_HISTORY_DEPTH);

        let settings = Settings::try_from(raw.clone()).unwrap();
        assert_eq!(settings.grouping, GroupingStrategy::Count(2));
        assert_eq!(RawSettings::from(&settings), raw);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.throttle_interval, Duration::from_millis(2000));
        assert_eq!(config.timeline_interval(), Duration::from_millis(10_000));
        assert_eq!(config.history_bound, DEFAULT_HISTORY_BOUND);
        assert_eq!(
            config.settings().unwrap().grouping,
            GroupingStrategy::Density(DEFAULT_EPS)
        );
    }
}
