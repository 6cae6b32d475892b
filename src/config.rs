//! Client backend configuration: which capi server to talk to.
//!
//! Values come from a JSON file, then environment overrides:
//!
//! ```json
//! { "host": "capi.example", "service": "2662" }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ipc::DEFAULT_CAPI_PORT;

/// Environment variable overriding [`BackendConfig::host`].
pub const HOST_ENV: &str = "CAPI_REMOTE_HOST";
/// Environment variable overriding [`BackendConfig::service`].
pub const SERVICE_ENV: &str = "CAPI_REMOTE_SERVICE";

const CONFIG_FILE_NAME: &str = "capiclient.json";

/// Host and service of the capi server a backend connects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Numeric port or a known service name.
    #[serde(default = "default_service")]
    pub service: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_service() -> String {
    DEFAULT_CAPI_PORT.to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            service: default_service(),
        }
    }
}

impl BackendConfig {
    pub fn new(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
        }
    }

    /// Read a configuration file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Defaults overlaid with the environment.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Replace fields for which an override variable is set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(host) = env_value(HOST_ENV) {
            self.host = host;
        }
        if let Some(service) = env_value(SERVICE_ENV) {
            self.service = service;
        }
        self
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the default configuration file path.
///
/// Resolution order:
/// 1. `$XDG_CONFIG_HOME/capiclient.json` (Linux standard)
/// 2. the platform config dir (`~/Library/Application Support` on macOS)
/// 3. `/etc/capiclient.json` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !config_home.is_empty() {
            return PathBuf::from(config_home).join(CONFIG_FILE_NAME);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join(CONFIG_FILE_NAME);
    }

    PathBuf::from("/etc").join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.service, "2662");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"host": "capi.example"}}"#).unwrap();

        let config = BackendConfig::load(file.path()).unwrap();
        assert_eq!(config, BackendConfig::new("capi.example", "2662"));
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "host = capi").unwrap();

        let err = BackendConfig::load(file.path()).unwrap_err();
        assert!(
            err.to_string().contains("Invalid config file"),
            "Unexpected error: {}",
            err
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BackendConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    /// Only test touching the override variables; restores them afterwards.
    #[test]
    fn test_env_overrides() {
        let saved: Vec<_> = [HOST_ENV, SERVICE_ENV]
            .iter()
            .map(|name| (*name, std::env::var_os(name)))
            .collect();

        std::env::set_var(HOST_ENV, "capi.example");
        std::env::set_var(SERVICE_ENV, "capi");
        let overridden = BackendConfig::from_env();

        std::env::set_var(HOST_ENV, "");
        std::env::set_var(SERVICE_ENV, "  ");
        let blank = BackendConfig::new("pbx.local", "5000").with_env_overrides();

        for (name, value) in saved {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }

        assert_eq!(overridden, BackendConfig::new("capi.example", "capi"));
        assert_eq!(blank, BackendConfig::new("pbx.local", "5000"));
    }

    #[test]
    fn test_default_config_path_format() {
        let path = default_config_path();
        let filename = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(filename, "capiclient.json");
    }
}
