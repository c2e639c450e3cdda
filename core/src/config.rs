//! Worker configuration.
//!
//! Everything the build worker needs that is not part of an individual
//! request: retry counts, the inspection tool timeout, the registry
//! credential file, the binary image lookup table and the per-request
//! log directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Total attempts for retryable operations (inspection, pull)
    #[serde(default = "default_total_attempts")]
    pub total_attempts: u32,

    /// Command timeout passed to the inspection tool (e.g. "300s")
    #[serde(default = "default_skopeo_timeout")]
    pub skopeo_timeout: String,

    /// Labels every input bundle must carry, as label -> expected value
    #[serde(default)]
    pub required_labels: HashMap<String, String>,

    /// Binary image lookup table, keyed by distribution scope then ocp version
    #[serde(default)]
    pub binary_image_config: HashMap<String, HashMap<String, String>>,

    /// Registry credential file mutated by credential scopes
    #[serde(default = "default_registry_auth_file")]
    pub registry_auth_file: PathBuf,

    /// Directory for per-request log files; unset disables them
    #[serde(default)]
    pub request_logs_dir: Option<PathBuf>,

    /// Level for per-request log files
    #[serde(default = "default_request_logs_level")]
    pub request_logs_level: String,
}

fn default_total_attempts() -> u32 {
    5
}

fn default_skopeo_timeout() -> String {
    "300s".to_string()
}

fn default_registry_auth_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docker")
        .join("config.json")
}

fn default_request_logs_level() -> String {
    "debug".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            total_attempts: default_total_attempts(),
            skopeo_timeout: default_skopeo_timeout(),
            required_labels: HashMap::new(),
            binary_image_config: HashMap::new(),
            registry_auth_file: default_registry_auth_file(),
            request_logs_dir: None,
            request_logs_level: default_request_logs_level(),
        }
    }
}

impl WorkerConfig {
    /// Load the configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::Config(format!(
                "Failed to read the worker config at {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            ForgeError::Config(format!(
                "Failed to parse the worker config at {}: {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded the worker config");
        Ok(config)
    }

    /// Check constraints the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.total_attempts == 0 {
            return Err(ForgeError::Config(
                "total_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.total_attempts, 5);
        assert_eq!(config.skopeo_timeout, "300s");
        assert!(config.required_labels.is_empty());
        assert!(config.binary_image_config.is_empty());
        assert!(config.request_logs_dir.is_none());
        assert_eq!(config.request_logs_level, "debug");
        assert!(config
            .registry_auth_file
            .ends_with(".docker/config.json"));
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "total_attempts": 3,
                "skopeo_timeout": "120s",
                "binary_image_config": {
                    "prod": {"v4.5": "registry.example.com/ose-operator-registry:v4.5"}
                }
            }"#,
        )
        .unwrap();

        let config = WorkerConfig::from_file(&path).unwrap();
        assert_eq!(config.total_attempts, 3);
        assert_eq!(config.skopeo_timeout, "120s");
        assert_eq!(
            config.binary_image_config["prod"]["v4.5"],
            "registry.example.com/ose-operator-registry:v4.5"
        );
        // Unspecified fields fall back to defaults
        assert_eq!(config.request_logs_level, "debug");
    }

    #[test]
    fn test_from_file_missing() {
        let result = WorkerConfig::from_file("/nonexistent/config.json");
        assert!(matches!(result, Err(ForgeError::Config(_))));
    }

    #[test]
    fn test_from_file_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let result = WorkerConfig::from_file(&path);
        assert!(matches!(result, Err(ForgeError::Config(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"total_attempts": 0}"#).unwrap();
        let result = WorkerConfig::from_file(&path);
        assert!(matches!(result, Err(ForgeError::Config(_))));
    }
}
