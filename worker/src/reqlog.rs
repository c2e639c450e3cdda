//! Per-request log capture.
//!
//! Each build request can have its own log file so its history is
//! reviewable in isolation. While a [`RequestLogGuard`] is live, events
//! emitted on the current thread are written to the request's file
//! instead of the process-wide subscriber; dropping the guard ends the
//! capture.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use forge_core::error::{ForgeError, Result};
use forge_core::WorkerConfig;

/// Install the process-wide subscriber.
///
/// Reads the filter from `RUST_LOG`, defaulting to `info`. Returns an
/// error when a subscriber is already installed.
pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| ForgeError::Config(format!("Failed to initialize logging: {}", err)))
}

/// Keeps a request's log capture alive.
#[derive(Debug)]
pub struct RequestLogGuard {
    path: PathBuf,
    _scope: tracing::subscriber::DefaultGuard,
}

impl RequestLogGuard {
    /// Where this request's logs are written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Start capturing the current thread's logs for a request.
///
/// Returns `None` when the configuration has no log directory. The file
/// is named after the request id and appended to, so a retried request
/// keeps its earlier history.
pub fn capture_request_logs(
    config: &WorkerConfig,
    request_id: u64,
) -> Result<Option<RequestLogGuard>> {
    let Some(dir) = &config.request_logs_dir else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.log", request_id));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = EnvFilter::try_new(&config.request_logs_level).map_err(|err| {
        ForgeError::Config(format!(
            "Invalid request_logs_level '{}': {}",
            config.request_logs_level, err
        ))
    })?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    let scope = tracing::subscriber::set_default(subscriber);

    tracing::debug!(request_id, "Started logging for the request");
    Ok(Some(RequestLogGuard {
        path,
        _scope: scope,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_with_dir(dir: &TempDir, level: &str) -> WorkerConfig {
        WorkerConfig {
            request_logs_dir: Some(dir.path().join("logs")),
            request_logs_level: level.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_log_dir_means_no_capture() {
        let config = WorkerConfig::default();
        assert!(capture_request_logs(&config, 1).unwrap().is_none());
    }

    #[test]
    fn test_capture_writes_to_request_file() {
        let dir = TempDir::new().unwrap();
        let config = config_with_dir(&dir, "debug");

        let path = {
            let guard = capture_request_logs(&config, 42).unwrap().unwrap();
            tracing::info!("Resolving the container images");
            guard.path().to_path_buf()
        };

        assert_eq!(path, dir.path().join("logs").join("42.log"));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Resolving the container images"));
    }

    #[test]
    fn test_capture_respects_level() {
        let dir = TempDir::new().unwrap();
        let config = config_with_dir(&dir, "warn");

        let path = {
            let guard = capture_request_logs(&config, 7).unwrap().unwrap();
            tracing::info!("below the configured level");
            tracing::warn!("at the configured level");
            guard.path().to_path_buf()
        };

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("below the configured level"));
        assert!(contents.contains("at the configured level"));
    }

    #[test]
    fn test_capture_appends_across_retries() {
        let dir = TempDir::new().unwrap();
        let config = config_with_dir(&dir, "debug");

        for attempt in 1..=2u32 {
            let _guard = capture_request_logs(&config, 9).unwrap().unwrap();
            tracing::info!(attempt, "Handling the request");
        }

        let contents =
            std::fs::read_to_string(dir.path().join("logs").join("9.log")).unwrap();
        assert_eq!(contents.matches("Handling the request").count(), 2);
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = config_with_dir(&dir, "!!nonsense!!");
        let err = capture_request_logs(&config, 3).unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }
}
