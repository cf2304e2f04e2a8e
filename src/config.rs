//! Engine configuration.
//!
//! Settings are read from a JSON file named by `APPROVALS_CONFIG`; missing
//! keys (or a missing file) fall back to defaults. A few deployment values
//! can be overridden directly from the environment.

use crate::error::AppError;
use crate::services::aggregation::RoundScope;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the JSON config file.
pub const CONFIG_PATH_ENV: &str = "APPROVALS_CONFIG";
pub const DATABASE_PATH_ENV: &str = "APPROVALS_DATABASE_PATH";
pub const BIND_ADDR_ENV: &str = "APPROVALS_BIND_ADDR";

/// Email transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// When false, emails are only logged.
    pub enabled: bool,

    /// Endpoint of the HTTP email API.
    pub api_url: String,

    /// Bearer key for the email API.
    pub api_key: Option<String>,

    /// Sender address.
    pub from: String,

    /// Per-message send timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: None,
            from: "noreply@localhost".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// HTTP listen address.
    pub bind_addr: String,

    /// Absolute base URL used for links in emails.
    pub public_base_url: String,

    /// Upper bound for a single HTTP request.
    pub request_timeout_secs: u64,

    /// Upper bound for notification fan-out when a round is issued.
    pub round_timeout_secs: u64,

    /// Which votes count toward a round-based artifact's status.
    pub round_scope: RoundScope,

    pub email: EmailConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/approvals.db"),
            bind_addr: "127.0.0.1:8080".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 30,
            round_timeout_secs: 20,
            round_scope: RoundScope::AllRounds,
            email: EmailConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, AppError> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Ok(path) = std::env::var(DATABASE_PATH_ENV) {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(addr) = std::env::var(BIND_ADDR_ENV) {
            config.bind_addr = addr;
        }

        Ok(config)
    }

    /// Read a JSON config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::warn!("[config] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::internal(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        Ok(serde_json::from_str(&raw)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.round_timeout_secs)
    }

    pub fn email_timeout(&self) -> Duration {
        Duration::from_secs(self.email.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"round_scope": "latest_round", "email": {"enabled": true, "api_key": "k"}}"#,
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.round_scope, RoundScope::LatestRound);
        assert!(config.email.enabled);
        assert_eq!(config.email.api_key.as_deref(), Some("k"));
        assert_eq!(config.email.timeout_secs, 10);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::from_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.round_scope, RoundScope::AllRounds);
        assert!(!config.email.enabled);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(EngineConfig::from_file(&path).is_err());
    }
}
