//! Bridge configuration.
//!
//! Loaded from JSON. Every field has a default, so an empty object is a
//! valid configuration.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for one event class monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Driver units whose events this class listens to.
    pub units: Vec<i32>,
    /// Per-subscriber delivery queue depth. A subscriber that falls this far
    /// behind is dropped.
    pub subscriber_queue_capacity: usize,
    /// Prefix for dispatch and writer thread names.
    pub thread_name_prefix: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            units: vec![0],
            subscriber_queue_capacity: 1024,
            thread_name_prefix: "nslbridge".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Checks the settings; `section` names this monitor in error messages.
    pub fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.units.is_empty() {
            return Err(invalid(section, "units", "at least one unit is required"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.units.iter().find(|u| !seen.insert(**u)) {
            return Err(invalid(section, "units", &format!("unit {dup} listed twice")));
        }
        if self.subscriber_queue_capacity == 0 {
            return Err(invalid(section, "subscriber_queue_capacity", "must be at least 1"));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Link state monitor.
    pub link: MonitorConfig,
    /// L2 table monitor.
    pub l2: MonitorConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            link: MonitorConfig::default(),
            l2: MonitorConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(invalid("", "log_level", "must not be empty"));
        }
        self.link.validate("link")?;
        self.l2.validate("l2")
    }
}

fn invalid(section: &str, field: &str, reason: &str) -> ConfigError {
    let field = if section.is_empty() {
        field.to_string()
    } else {
        format!("{section}.{field}")
    };
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg = BridgeConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, BridgeConfig::default());
        assert_eq!(cfg.link.units, vec![0]);
        assert_eq!(cfg.l2.subscriber_queue_capacity, 1024);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = BridgeConfig::from_json_str(r#"{"l2": {"units": [0, 1]}, "log_level": "debug"}"#).unwrap();
        assert_eq!(cfg.l2.units, vec![0, 1]);
        assert_eq!(cfg.l2.thread_name_prefix, "nslbridge");
        assert_eq!(cfg.link, MonitorConfig::default());
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn rejects_duplicate_units() {
        let err = BridgeConfig::from_json_str(r#"{"link": {"units": [1, 1]}}"#).unwrap_err();
        let ConfigError::Invalid { field, reason } = err else {
            panic!("expected Invalid, got {err:?}");
        };
        assert_eq!(field, "link.units");
        assert!(reason.contains("unit 1"));
    }

    #[test]
    fn rejects_zero_queue_capacity_and_empty_units() {
        let err = BridgeConfig::from_json_str(r#"{"l2": {"subscriber_queue_capacity": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "l2.subscriber_queue_capacity"));

        let err = BridgeConfig::from_json_str(r#"{"link": {"units": []}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "link.units"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = BridgeConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"link": {{"subscriber_queue_capacity": 8}}}}"#).unwrap();

        let cfg = BridgeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(cfg.link.subscriber_queue_capacity, 8);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BridgeConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
