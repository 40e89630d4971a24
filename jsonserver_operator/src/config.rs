//! Operator configuration, loadable from YAML.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, verbose
    #[default]
    Dev,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Namespace to watch; all namespaces when unset
    #[serde(default)]
    pub namespace: Option<String>,

    /// Periodic resync of every JsonServer (seconds)
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// Requeue delay after a failed pass (seconds)
    #[serde(default = "default_error_requeue")]
    pub error_requeue_secs: u64,

    /// Requeue delay after an optimistic-concurrency conflict (seconds)
    #[serde(default = "default_conflict_requeue")]
    pub conflict_requeue_secs: u64,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_resync_interval() -> u64 { 300 }
fn default_error_requeue() -> u64 { 30 }
fn default_conflict_requeue() -> u64 { 1 }

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            resync_interval_secs: 300,
            error_requeue_secs: 30,
            conflict_requeue_secs: 1,
            log_format: LogFormat::Dev,
        }
    }
}

impl OperatorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("resync_interval_secs", self.resync_interval_secs),
            ("error_requeue_secs", self.error_requeue_secs),
            ("conflict_requeue_secs", self.conflict_requeue_secs),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", field)));
            }
        }
        if let Some(ns) = &self.namespace {
            if ns.is_empty() {
                return Err(Error::Config("namespace must not be empty".to_string()));
            }
        }
        Ok(())
    }

    /// Load configuration from YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }

    pub fn conflict_requeue(&self) -> Duration {
        Duration::from_secs(self.conflict_requeue_secs)
    }
}
