//! Configuration management
//!
//! Layers, lowest precedence first: built-in defaults, an optional
//! `config.{toml,json,yaml}` in the config directory, `AUDAC_*` environment
//! variables (`AUDAC_MATRIX__HOST`, `AUDAC_POLL_INTERVAL_SECS`, ...), and the
//! `AUDAC_HOST` / `AUDAC_PORT` shorthands.

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::MatrixError;

pub const DEFAULT_HOST: &str = "192.168.1.100";
pub const DEFAULT_PORT: u16 = 5001;
/// MTX48; the MTX88 has 8
pub const DEFAULT_ZONES: u8 = 4;
/// Fixed protocol destination of the MTX
pub const DEFAULT_DEVICE_ID: &str = "X001";
pub const DEFAULT_SOURCE_ID: &str = "HA";
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Longest source id the device accepts
const MAX_SOURCE_ID_LEN: usize = 4;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub matrix: MatrixSettings,
    pub poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            matrix: MatrixSettings::default(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Endpoint and identity of one matrix unit
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MatrixSettings {
    pub host: String,
    pub port: u16,
    pub zones: u8,
    pub device_id: String,
    pub source_id: String,
    /// Bound on connect and on each full command round trip
    pub timeout_ms: u64,
}

impl Default for MatrixSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            zones: DEFAULT_ZONES,
            device_id: DEFAULT_DEVICE_ID.to_string(),
            source_id: DEFAULT_SOURCE_ID.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl MatrixSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject identities that would corrupt a frame.
    pub fn validate(&self) -> std::result::Result<(), MatrixError> {
        if self.zones == 0 {
            return Err(MatrixError::InvalidIdentity(
                "zone count must be at least 1".to_string(),
            ));
        }
        if self.source_id.is_empty() || self.source_id.chars().count() > MAX_SOURCE_ID_LEN {
            return Err(MatrixError::InvalidIdentity(format!(
                "source id {:?} must be 1 to {} characters",
                self.source_id, MAX_SOURCE_ID_LEN
            )));
        }
        if self.device_id.is_empty() {
            return Err(MatrixError::InvalidIdentity(
                "device id must not be empty".to_string(),
            ));
        }
        for (name, value) in [
            ("device id", &self.device_id),
            ("source id", &self.source_id),
            ("host", &self.host),
        ] {
            if value.contains(|c: char| matches!(c, '|' | '^' | '\r' | '\n')) {
                return Err(MatrixError::InvalidIdentity(format!(
                    "{} {:?} contains a reserved character",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Get config directory (AUDAC_CONFIG_DIR, XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AUDAC_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support/audac-mtx-bridge");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("audac-mtx-bridge");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config/audac-mtx-bridge");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("audac-mtx-bridge");
        }
    }

    PathBuf::from(".")
}

pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_dir())
}

pub fn load_config_from(config_dir: &Path) -> Result<Config> {
    let mut builder = ::config::Config::builder()
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        .add_source(
            ::config::Environment::with_prefix("AUDAC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    // Shorthands win over everything else
    if let Ok(host) = std::env::var("AUDAC_HOST") {
        builder = builder.set_override("matrix.host", host)?;
    }
    if let Ok(port) = std::env::var("AUDAC_PORT") {
        match port.parse::<u16>() {
            Ok(port_num) => builder = builder.set_override("matrix.port", port_num as i64)?,
            Err(_) => tracing::warn!("Ignoring invalid AUDAC_PORT {:?}", port),
        }
    }

    let config: Config = builder.build()?.try_deserialize()?;
    config.matrix.validate()?;

    Ok(config)
}
