//! Configuration management for usagegate.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::error::{Result, UsageGateError};
use crate::store::{CounterStore, JsonFileStore, MemoryStore};
use crate::usage::RulesConfig;

/// Main configuration for usagegate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageGateConfig {
    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Calendar configuration
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Counter and gate definitions
    #[serde(default)]
    pub rules: RulesConfig,
}

/// Which counter store backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Memory,
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Location of the counter file for the file backend
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("usage_counters.json")
}

impl StoreConfig {
    /// Open the configured store.
    pub fn open(&self) -> Result<Arc<dyn CounterStore>> {
        match self.backend {
            StoreBackend::File => Ok(Arc::new(JsonFileStore::open(&self.path)?)),
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        }
    }
}

/// Calendar configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Offset from UTC, in minutes, at which day and month boundaries fall
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl CalendarConfig {
    /// The configured offset as a chrono offset.
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                UsageGateError::Config(format!(
                    "utc_offset_minutes out of range: {}",
                    self.utc_offset_minutes
                ))
            })
    }
}

impl UsageGateConfig {
    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&contents)?;

        info!(
            path = %path.display(),
            counters = config.rules.counters.len(),
            gates = config.rules.gates.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: UsageGateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| UsageGateError::Config(e.to_string()))?;
        config.calendar.utc_offset()?;
        config.rules.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::TimeUnit;

    #[test]
    fn test_defaults() {
        let config = UsageGateConfig::from_yaml("{}").unwrap();
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.store.path, PathBuf::from("usage_counters.json"));
        assert_eq!(config.calendar.utc_offset().unwrap().local_minus_utc(), 0);
        assert!(config.rules.counters.is_empty());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
store:
  backend: memory
calendar:
  utc_offset_minutes: -300
rules:
  context: ads
  counters:
    daily: { unit: day, limit: 3 }
  gates:
    interstitial: { rule: any, members: [daily] }
"#;
        let config = UsageGateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.calendar.utc_offset().unwrap().local_minus_utc(), -300 * 60);
        assert_eq!(config.rules.counters["daily"].unit, TimeUnit::Day);
        assert!(config.store.open().is_ok());
    }

    #[test]
    fn test_example_config_builds() {
        use crate::usage::{GateRegistry, ManualClock, UsageCounter};

        let config = UsageGateConfig::from_yaml(include_str!("../usagegate.example.yaml")).unwrap();
        let registry = GateRegistry::build(
            &config.rules,
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::parse_rfc3339("2016-04-14T12:00:00Z").unwrap()),
            config.calendar.utc_offset().unwrap(),
        )
        .unwrap();

        let gate = registry.require("interstitial").unwrap();
        for _ in 0..3 {
            assert!(!gate.record().unwrap());
        }
        assert!(gate.record().unwrap());
    }

    #[test]
    fn test_offset_out_of_range() {
        let yaml = r#"
calendar:
  utc_offset_minutes: 1440
"#;
        assert!(matches!(
            UsageGateConfig::from_yaml(yaml),
            Err(UsageGateError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_rules_are_rejected() {
        let yaml = r#"
rules:
  gates:
    g: { members: [nobody] }
"#;
        assert!(UsageGateConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_from_file_opens_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("usagegate.yaml");
        let store_path = dir.path().join("counters.json");
        std::fs::write(
            &config_path,
            format!("store:\n  path: {}\n", store_path.display()),
        )
        .unwrap();

        let config = UsageGateConfig::from_file(&config_path).unwrap();
        assert_eq!(config.store.path, store_path);

        let store = config.store.open().unwrap();
        store
            .set_counter(1, "k", &crate::store::Context::default())
            .unwrap();
        assert!(store_path.exists());
    }
}
