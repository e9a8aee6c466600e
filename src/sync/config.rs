//! Configuration for the folder-sync client
//!
//! Same layering as the server: defaults, an optional `sync.toml`, then
//! `RAX_SYNC_*` environment variables.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATHS: &[&str] = &["rax-upload-server/sync", "sync"];

pub const ENV_PREFIX: &str = "RAX_SYNC";

/// Sync client configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Base URL of the upload server, e.g. `http://127.0.0.1:7888`
    pub server_url: String,

    /// Local folder mirrored to the server
    pub folder_to_watch: String,

    /// Seconds between two scans
    pub interval_secs: u64,
}

impl SyncConfig {
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

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::finish(Self::defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server_url", "http://127.0.0.1:7888")?
            .set_default("folder_to_watch", "./outbox")?
            .set_default("interval_secs", 10_i64)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: SyncConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::Message(format!(
                "server_url must be an http(s) URL, got {:?}",
                self.server_url
            )));
        }

        if self.folder_to_watch.trim().is_empty() {
            return Err(ConfigError::Message(
                "folder_to_watch cannot be empty".into(),
            ));
        }

        if self.interval_secs == 0 {
            return Err(ConfigError::Message(
                "interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub fn folder_path(&self) -> PathBuf {
        PathBuf::from(&self.folder_to_watch)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
