// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CollectorError, Result};

/// Optional parts of the logical disk collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubCollector {
    Metrics,
    BitlockerStatus,
}

impl SubCollector {
    pub const ALL: [SubCollector; 2] = [SubCollector::Metrics, SubCollector::BitlockerStatus];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubCollector::Metrics => "metrics",
            SubCollector::BitlockerStatus => "bitlocker_status",
        }
    }
}

impl FromStr for SubCollector {
    type Err = CollectorError;

    fn from_str(value: &str) -> Result<Self> {
        SubCollector::ALL
            .into_iter()
            .find(|sub| sub.as_str() == value)
            .ok_or_else(|| CollectorError::UnknownSubCollector(value.to_string()))
    }
}

impl fmt::Display for SubCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LoggingLevel::Error => "error",
            LoggingLevel::Warn => "warn",
            LoggingLevel::Info => "info",
            LoggingLevel::Debug => "debug",
            LoggingLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Sub collectors to run, validated when the collector is built.
    pub enabled: Vec<String>,
    /// Volumes to collect, as an unanchored regular expression.
    pub volume_include: String,
    /// Volumes to skip, as an unanchored regular expression.
    pub volume_exclude: String,
    pub log_level: LoggingLevel,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: vec![SubCollector::Metrics.as_str().to_string()],
            volume_include: ".+".to_string(),
            volume_exclude: String::new(),
            log_level: LoggingLevel::default(),
        }
    }
}

/// Values given on the command line. Anything set here wins over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub enabled: Option<Vec<String>>,
    pub volume_include: Option<String>,
    pub volume_exclude: Option<String>,
    pub log_level: Option<LoggingLevel>,
}

impl CollectorConfig {
    /// Load the config file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path).map_err(|error| CollectorError::ConfigIo {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        toml::from_str(&raw).map_err(|error| CollectorError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(enabled) = overrides.enabled {
            self.enabled = enabled;
        }
        if let Some(include) = overrides.volume_include {
            self.volume_include = include;
        }
        if let Some(exclude) = overrides.volume_exclude {
            self.volume_exclude = exclude;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        self
    }

    /// Parse `enabled`, rejecting unknown names. Blank entries are ignored.
    pub fn sub_collectors(&self) -> Result<Vec<SubCollector>> {
        let mut sub_collectors = Vec::new();
        for name in self.enabled.iter().map(|name| name.trim()) {
            if name.is_empty() {
                continue;
            }

            let sub = name.parse()?;
            if !sub_collectors.contains(&sub) {
                sub_collectors.push(sub);
            }
        }
        Ok(sub_collectors)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_collect_every_volume_with_metrics() {
        let config = CollectorConfig::default();

        assert_eq!(config.enabled, vec!["metrics".to_string()]);
        assert_eq!(config.volume_include, ".+");
        assert_eq!(config.volume_exclude, "");
        assert_eq!(config.sub_collectors().unwrap(), vec![SubCollector::Metrics]);
    }

    #[test]
    fn unknown_sub_collector_lists_possible_values() {
        let config = CollectorConfig {
            enabled: vec!["metrics".to_string(), "smart".to_string()],
            ..CollectorConfig::default()
        };

        let error = config.sub_collectors().unwrap_err();

        let possible: Vec<&str> = SubCollector::ALL.iter().map(|sub| sub.as_str()).collect();
        assert_eq!(
            error.to_string(),
            format!(
                "unknown sub collector: smart. Possible values: {}",
                possible.join(", ")
            )
        );
    }

    #[test]
    fn sub_collectors_are_deduplicated() {
        let config = CollectorConfig {
            enabled: vec![
                "bitlocker_status".to_string(),
                " metrics ".to_string(),
                "bitlocker_status".to_string(),
                String::new(),
            ],
            ..CollectorConfig::default()
        };

        assert_eq!(
            config.sub_collectors().unwrap(),
            vec![SubCollector::BitlockerStatus, SubCollector::Metrics]
        );
    }

    #[test]
    fn loads_partial_file_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "enabled = [\"metrics\", \"bitlocker_status\"]\nvolume_exclude = \"HarddiskVolume.*\"\nlog_level = \"debug\""
        )
        .unwrap();

        let config = CollectorConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.enabled.len(), 2);
        assert_eq!(config.volume_include, ".+");
        assert_eq!(config.volume_exclude, "HarddiskVolume.*");
        assert_eq!(config.log_level, LoggingLevel::Debug);
    }

    #[test]
    fn reports_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "enabled = \"metrics\"").unwrap();

        let error = CollectorConfig::load(Some(file.path())).unwrap_err();

        assert!(matches!(error, CollectorError::ConfigInvalid { .. }));
    }

    #[test]
    fn reports_missing_file() {
        let error =
            CollectorConfig::load(Some(Path::new("/nonexistent/logical-disk.toml"))).unwrap_err();

        assert!(matches!(error, CollectorError::ConfigIo { .. }));
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let config = CollectorConfig::default().with_overrides(ConfigOverrides {
            volume_include: Some("[C-D]:".to_string()),
            log_level: Some(LoggingLevel::Warn),
            ..ConfigOverrides::default()
        });

        assert_eq!(config.enabled, vec!["metrics".to_string()]);
        assert_eq!(config.volume_include, "[C-D]:");
        assert_eq!(config.volume_exclude, "");
        assert_eq!(config.log_level, LoggingLevel::Warn);
    }
}
