//! Configuration management for the upload client.
//!
//! Configuration is stored in TOML format and covers the server endpoint,
//! the transfer tuning knobs (worker count, batch size, attempt budget) and
//! where filtered files are written. Command line flags override file values.

use crate::error::UploadError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// Transfer tuning constants
pub const PACKAGE_SIZE: usize = 100; // reads per request
pub const WORKER_THREADS: usize = 4;
pub const MAX_ATTEMPTS: u32 = 5;

// Network constants
pub const DEFAULT_SERVER_URL: &str = "https://127.0.0.1/api";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

// Output constants
pub const GZIP_COMPRESSION_LEVEL: u32 = 6;
pub const PROGRESS_BAR_ENABLED: bool = true;

/// Main configuration structure containing all subsystem configurations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upload client configuration.
    pub client: ClientConfig,
    /// Reconstruction output configuration.
    pub output: OutputConfig,
}

/// Configuration for talking to the filtering server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `https://host/api`.
    pub server_url: String,
    /// Number of concurrent transfer workers.
    pub worker_threads: usize,
    /// Maximum number of reads per request.
    pub package_size: usize,
    /// Failed attempts tolerated per batch before a worker gives up.
    pub max_attempts: u32,
    pub timeout_seconds: u64,
    /// Accept self-signed certificates. Off unless explicitly enabled.
    pub accept_invalid_certs: bool,
    pub progress_bar_enabled: bool,
}

/// Configuration for reconstructed output files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for `filtered.*` files; no reconstruction when unset.
    pub output_directory: Option<String>,
    pub compression_level: u32,
}

impl Config {
    /// Loads configuration from a file, or creates a new default configuration
    /// if the file doesn't exist.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    ///
    /// Returns the loaded or newly created configuration, or an error if
    /// the file exists but cannot be read or parsed.
    pub fn load_or_create(path: &PathBuf) -> Result<Self, UploadError> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to a file in TOML format.
    pub fn save(&self, path: &PathBuf) -> Result<(), UploadError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Rejects settings the upload engine cannot work with.
    pub fn validate(&self) -> Result<(), UploadError> {
        self.client.validate()?;
        if self.output.compression_level > 9 {
            return Err(UploadError::ConfigError(format!(
                "compression_level must be between 0 and 9, got {}",
                self.output.compression_level
            )));
        }
        Ok(())
    }
}

impl ClientConfig {
    /// Rejects zero-valued tuning knobs and an empty server URL.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.server_url.trim().is_empty() {
            return Err(UploadError::ConfigError("server_url is empty".to_string()));
        }
        if self.worker_threads == 0 {
            return Err(UploadError::ConfigError(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.package_size == 0 {
            return Err(UploadError::ConfigError(
                "package_size must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(UploadError::ConfigError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            worker_threads: WORKER_THREADS,
            package_size: PACKAGE_SIZE,
            max_attempts: MAX_ATTEMPTS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            accept_invalid_certs: false,
            progress_bar_enabled: PROGRESS_BAR_ENABLED,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_directory: None,
            compression_level: GZIP_COMPRESSION_LEVEL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();

        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.worker_threads, WORKER_THREADS);
        assert_eq!(config.package_size, PACKAGE_SIZE);
        assert_eq!(config.max_attempts, MAX_ATTEMPTS);
        assert_eq!(config.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert!(!config.accept_invalid_certs);
        assert!(config.progress_bar_enabled);
    }

    #[test]
    fn test_output_config_default() {
        let config = OutputConfig::default();

        assert!(config.output_directory.is_none());
        assert_eq!(config.compression_level, GZIP_COMPRESSION_LEVEL);
    }

    #[test]
    fn test_constants() {
        assert_eq!(PACKAGE_SIZE, 100);
        assert_eq!(WORKER_THREADS, 4);
        assert_eq!(MAX_ATTEMPTS, 5);
        assert_eq!(DEFAULT_TIMEOUT_SECONDS, 30);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.output.output_directory = Some("./filtered".to_string());
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.client.server_url, deserialized.client.server_url);
        assert_eq!(config.client.package_size, deserialized.client.package_size);
        assert_eq!(
            deserialized.output.output_directory.as_deref(),
            Some("./filtered")
        );
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("swgts.toml");

        let mut original_config = Config::default();
        original_config.client.worker_threads = 8;
        original_config.save(&config_path).unwrap();

        let loaded_config = Config::load_or_create(&config_path).unwrap();

        assert_eq!(loaded_config.client.worker_threads, 8);
        assert_eq!(
            original_config.client.server_url,
            loaded_config.client.server_url
        );
    }

    #[test]
    fn test_config_create_new() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("new_config.toml");

        let config = Config::load_or_create(&config_path).unwrap();

        assert!(config_path.exists());
        assert_eq!(config.client.package_size, PACKAGE_SIZE);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.client.worker_threads = 0;
        assert!(matches!(config.validate(), Err(UploadError::ConfigError(_))));

        config.client.worker_threads = 1;
        config.client.package_size = 0;
        assert!(matches!(config.validate(), Err(UploadError::ConfigError(_))));

        config.client.package_size = 1;
        config.client.max_attempts = 0;
        assert!(matches!(config.validate(), Err(UploadError::ConfigError(_))));

        config.client.max_attempts = 1;
        config.output.compression_level = 12;
        assert!(matches!(config.validate(), Err(UploadError::ConfigError(_))));
    }
}
