//! Configuration management for the RAX upload server
//!
//! Values come from built-in defaults, then an optional `config.toml`, then
//! `RAX_UPLOAD_*` environment variables. Everything here is read once at
//! startup.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::transfer::TransferLimits;

/// Locations searched for the config file, first existing one wins.
pub const CONFIG_PATHS: &[&str] = &[
    "rax-upload-server/config", // Docker production: /app/rax-upload-server/config.toml
    "config",                   // Local development: ./config.toml
];

/// Prefix for environment overrides, e.g. `RAX_UPLOAD_STORAGE_ROOT`.
pub const ENV_PREFIX: &str = "RAX_UPLOAD";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address the HTTP listener binds to
    pub bind_address: String,

    /// Port of the HTTP listener
    pub port: u16,

    /// Directory every stored file lives under
    pub storage_root: String,

    /// Buffer size for streaming uploads and decompression
    pub buffer_size: usize,

    /// Maximum size of an upload, and of its decompressed form, in MB
    pub max_file_size_mb: u64,

    /// Name suffix marking a compressed upload
    pub compression_suffix: String,
}

impl ServerConfig {
    /// Load configuration from the default locations with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let file = CONFIG_PATHS
            .iter()
            .find(|p| Path::new(&format!("{p}.toml")).is_file())
            .map(|p| File::with_name(p));

        let mut builder = Self::defaults()?;
        if let Some(file) = file {
            builder = builder.add_source(file);
        }
        Self::finish(builder.add_source(Environment::with_prefix(ENV_PREFIX)))
    }

    /// Load configuration from a TOML document, without environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::finish(Self::defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("bind_address", "0.0.0.0")?
            .set_default("port", 7888_i64)?
            .set_default("storage_root", "./upload")?
            .set_default("buffer_size", 8192_i64)?
            .set_default("max_file_size_mb", 1024_i64)?
            .set_default("compression_suffix", ".gz")
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Message("port cannot be 0".into()));
        }

        if self.storage_root.trim().is_empty() {
            return Err(ConfigError::Message("storage_root cannot be empty".into()));
        }

        if self.buffer_size == 0 {
            return Err(ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if self.max_file_size_mb == 0 {
            return Err(ConfigError::Message(
                "max_file_size_mb must be greater than 0".into(),
            ));
        }

        if self.max_file_size_mb.checked_mul(BYTES_PER_MB).is_none() {
            return Err(ConfigError::Message(
                "max_file_size_mb is too large".into(),
            ));
        }

        if !self.compression_suffix.starts_with('.') || self.compression_suffix.len() < 2 {
            return Err(ConfigError::Message(
                "compression_suffix must look like \".gz\"".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and port as socket address
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Get storage root as PathBuf
    pub fn storage_root_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_root)
    }

    /// Get maximum file size in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(BYTES_PER_MB)
    }

    pub fn transfer_limits(&self) -> TransferLimits {
        TransferLimits {
            buffer_size: self.buffer_size,
            max_file_size: self.max_file_size_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config.socket_addr(), "0.0.0.0:7888");
        assert_eq!(config.storage_root_path(), PathBuf::from("./upload"));
        assert_eq!(config.compression_suffix, ".gz");
        assert_eq!(config.transfer_limits().max_file_size, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_toml_str(
            r#"
            port = 9000
            storage_root = "/upload"
            max_file_size_mb = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.storage_root, "/upload");
        assert_eq!(config.max_file_size_bytes(), 5 * 1024 * 1024);
    }

    #[test]
    fn test_validation() {
        assert!(ServerConfig::from_toml_str("port = 0").is_err());
        assert!(ServerConfig::from_toml_str("storage_root = \"\"").is_err());
        assert!(ServerConfig::from_toml_str("buffer_size = 0").is_err());
        assert!(ServerConfig::from_toml_str("compression_suffix = \"gz\"").is_err());
    }

    #[test]
    fn test_size_limit_overflow() {
        let err = ServerConfig::from_toml_str("max_file_size_mb = 9223372036854775807").unwrap_err();
        assert!(err.to_string().contains("max_file_size_mb"));

        let config = ServerConfig::from_toml_str("max_file_size_mb = 17592186044415").unwrap();
        assert_eq!(config.max_file_size_bytes(), 17_592_186_044_415 * 1024 * 1024);
    }
}
