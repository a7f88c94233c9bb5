// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) holding every
// tunable of the engine:
// - Scheduling: conflict buffer, heuristic offsets, prediction timeout
// - Behavior: how many recent signals feed a prediction
// - Dispatch: sweep interval and per-send timeout
// - Lifecycle: optional TTL for unanswered deliveries
// - Retraining: deadline of the background retraining job

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::reminder::Channel;

pub const API_VERSION: &str = "nudge/v1";
pub const KIND: &str = "EngineConfig";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigManifest {
    /// API version (must be "nudge/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "EngineConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub scheduling: SchedulingConfig,

    #[serde(default)]
    pub behavior: BehaviorConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    #[serde(default)]
    pub retraining: RetrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Minimum separation between two scheduled occurrences of one user
    #[serde(default = "default_conflict_buffer", with = "humantime_serde")]
    pub conflict_buffer: Duration,

    /// Lower bound of the heuristic offset for templates without an end time
    #[serde(default = "default_fallback_min_offset", with = "humantime_serde")]
    pub fallback_min_offset: Duration,

    /// Upper bound of the heuristic offset
    #[serde(default = "default_fallback_max_offset", with = "humantime_serde")]
    pub fallback_max_offset: Duration,

    /// Upper bound on a model-backed prediction call
    #[serde(default = "default_prediction_timeout", with = "humantime_serde")]
    pub prediction_timeout: Duration,

    /// Channel used when neither the model nor the template picks one
    #[serde(default)]
    pub default_channel: Channel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Most recent observations / context samples handed to a strategy
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_dispatch_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_send_timeout", with = "humantime_serde")]
    pub send_timeout: Duration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// When set, `SENT` occurrences without an interaction for this long
    /// become `EXPIRED`. Unset keeps them `SENT` indefinitely.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub sent_ttl: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainingConfig {
    #[serde(default = "default_retraining_deadline", with = "humantime_serde")]
    pub deadline: Duration,
}

fn default_conflict_buffer() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_fallback_min_offset() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_fallback_max_offset() -> Duration {
    Duration::from_secs(5 * 60 * 60)
}

fn default_prediction_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_recent_limit() -> usize {
    100
}

fn default_dispatch_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_retraining_deadline() -> Duration {
    Duration::from_secs(10 * 60)
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            conflict_buffer: default_conflict_buffer(),
            fallback_min_offset: default_fallback_min_offset(),
            fallback_max_offset: default_fallback_max_offset(),
            prediction_timeout: default_prediction_timeout(),
            default_channel: Channel::default(),
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval: default_dispatch_interval(),
            send_timeout: default_send_timeout(),
        }
    }
}

impl Default for RetrainingConfig {
    fn default() -> Self {
        Self {
            deadline: default_retraining_deadline(),
        }
    }
}

impl Default for EngineConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "nudge".to_string(),
                labels: None,
            },
            spec: EngineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported apiVersion '{0}' (expected '{API_VERSION}')")]
    ApiVersion(String),

    #[error("unsupported kind '{0}' (expected '{KIND}')")]
    Kind(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("scheduling.fallback_min_offset must be below scheduling.fallback_max_offset")]
    InvertedOffsets,
}

/// Convert a configured duration into the chrono type used by the domain.
pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduling.conflict_buffer.is_zero() {
            return Err(ConfigError::Zero { field: "scheduling.conflict_buffer" });
        }
        if self.scheduling.fallback_min_offset >= self.scheduling.fallback_max_offset {
            return Err(ConfigError::InvertedOffsets);
        }
        if self.scheduling.prediction_timeout.is_zero() {
            return Err(ConfigError::Zero { field: "scheduling.prediction_timeout" });
        }
        if self.behavior.recent_limit == 0 {
            return Err(ConfigError::Zero { field: "behavior.recent_limit" });
        }
        if self.dispatch.interval.is_zero() {
            return Err(ConfigError::Zero { field: "dispatch.interval" });
        }
        if self.dispatch.send_timeout.is_zero() {
            return Err(ConfigError::Zero { field: "dispatch.send_timeout" });
        }
        if matches!(self.lifecycle.sent_ttl, Some(ttl) if ttl.is_zero()) {
            return Err(ConfigError::Zero { field: "lifecycle.sent_ttl" });
        }
        Ok(())
    }
}

impl EngineConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_version != API_VERSION {
            return Err(ConfigError::ApiVersion(self.api_version.clone()));
        }
        if self.kind != KIND {
            return Err(ConfigError::Kind(self.kind.clone()));
        }
        self.spec.validate()
    }

    /// Discover configuration file using precedence order
    /// 1. NUDGE_CONFIG_PATH environment variable
    /// 2. ./nudge-config.yaml (working directory)
    /// 3. ~/.nudge/config.yaml (user home)
    /// 4. /etc/nudge/config.yaml (Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("NUDGE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./nudge-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".nudge").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/nudge/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations, using defaults");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NUDGE_CONFLICT_BUFFER") {
            match humantime::parse_duration(&val) {
                Ok(d) => {
                    tracing::info!("Environment override: NUDGE_CONFLICT_BUFFER={}", val);
                    self.spec.scheduling.conflict_buffer = d;
                }
                Err(e) => tracing::warn!("Ignoring invalid NUDGE_CONFLICT_BUFFER '{}': {}", val, e),
            }
        }
        if let Ok(val) = std::env::var("NUDGE_DISPATCH_INTERVAL") {
            match humantime::parse_duration(&val) {
                Ok(d) => {
                    tracing::info!("Environment override: NUDGE_DISPATCH_INTERVAL={}", val);
                    self.spec.dispatch.interval = d;
                }
                Err(e) => tracing::warn!("Ignoring invalid NUDGE_DISPATCH_INTERVAL '{}': {}", val, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest_is_valid() {
        let manifest = EngineConfigManifest::default();
        assert_eq!(manifest.api_version, "nudge/v1");
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.spec.scheduling.conflict_buffer, Duration::from_secs(900));
        assert!(manifest.spec.lifecycle.sent_ttl.is_none());
    }

    #[test]
    fn test_yaml_with_humantime_durations() {
        let yaml = r#"
apiVersion: nudge/v1
kind: EngineConfig
metadata:
  name: test
spec:
  scheduling:
    conflict_buffer: 20m
    default_channel: email
  dispatch:
    interval: 30s
  lifecycle:
    sent_ttl: 2h
"#;
        let manifest = EngineConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.scheduling.conflict_buffer, Duration::from_secs(1200));
        assert_eq!(manifest.spec.scheduling.default_channel, Channel::Email);
        assert_eq!(manifest.spec.scheduling.fallback_max_offset, Duration::from_secs(5 * 3600));
        assert_eq!(manifest.spec.dispatch.interval, Duration::from_secs(30));
        assert_eq!(manifest.spec.lifecycle.sent_ttl, Some(Duration::from_secs(7200)));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut manifest = EngineConfigManifest::default();
        manifest.spec.scheduling.fallback_min_offset = Duration::from_secs(6 * 3600);
        assert_eq!(manifest.validate(), Err(ConfigError::InvertedOffsets));

        let mut manifest = EngineConfigManifest::default();
        manifest.spec.scheduling.conflict_buffer = Duration::ZERO;
        assert!(matches!(manifest.validate(), Err(ConfigError::Zero { .. })));

        let mut manifest = EngineConfigManifest::default();
        manifest.kind = "NodeConfig".to_string();
        assert!(matches!(manifest.validate(), Err(ConfigError::Kind(_))));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nudge-config.yaml");
        let mut manifest = EngineConfigManifest::default();
        manifest.spec.behavior.recent_limit = 25;
        manifest.to_yaml_file(&path).unwrap();

        let loaded = EngineConfigManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.spec.behavior.recent_limit, 25);
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EngineConfigManifest::load_or_default(Some(dir.path().join("absent.yaml"))).is_err());
    }
}
