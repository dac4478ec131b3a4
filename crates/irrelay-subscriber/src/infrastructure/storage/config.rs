//! TOML configuration for the subscriber.
//!
//! Read from `--config <path>` or, by default, `subscriber.toml` in the
//! platform config directory.  A missing file yields the defaults.
//!
//! ```toml
//! [connection]
//! host = "127.0.0.1"
//! port = 10765
//! reconnect_interval_secs = 5
//!
//! [subscriber]
//! repeat_delay = 0
//! echo_mode = false
//! log_level = "info"
//! devices = []                       # empty: every device in [keymaps]
//! codemap_file = "button-map.json"   # JSON object, hex code -> key name
//!
//! [codemap]
//! "40BD01FE" = "HOME"
//!
//! [keymaps.1.HOME]
//! key = "space"
//!
//! [keymaps.1.UP]
//! mouse = { move = [0, -10] }
//! delay = 1
//! ```
//!
//! `codemap_file` is resolved against the directory of the config file when
//! relative.  Inline `[codemap]` entries override the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use irrelay_core::config_dir::platform_config_dir;
use irrelay_core::keymap::{CodeMap, HandlerEntry, KeymapError, Keymaps};
use irrelay_core::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::SubscriberConnectionConfig;

/// File name of the subscriber config inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "subscriber.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read codemap file {path}: {source}")]
    CodemapFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse codemap file {path}: {source}")]
    CodemapJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("keymap for device {device}: handler for {key} sets no action")]
    EmptyHandler { device: String, key: String },

    #[error("keymap for device {device}: {source}")]
    Handler {
        device: String,
        #[source]
        source: KeymapError,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level subscriber configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubscriberConfig {
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub subscriber: SubscriberSection,
    /// Hex code to key name.
    #[serde(default)]
    pub codemap: HashMap<String, String>,
    /// Device id to key name to handler table.
    #[serde(default)]
    pub keymaps: HashMap<String, HashMap<String, HandlerEntry>>,
    /// Directory of the file this config was loaded from.
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

/// `[connection]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
}

/// `[subscriber]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriberSection {
    /// Global debounce threshold in repeat frames.
    #[serde(default)]
    pub repeat_delay: u32,
    /// Log signals instead of running handlers.
    #[serde(default)]
    pub echo_mode: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codemap_file: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_reconnect_interval_secs() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
        }
    }
}

impl Default for SubscriberSection {
    fn default() -> Self {
        Self {
            repeat_delay: 0,
            echo_mode: false,
            log_level: default_log_level(),
            devices: Vec::new(),
            codemap_file: None,
        }
    }
}

impl SubscriberConfig {
    /// Builds the code map: `codemap_file` entries overlaid by `[codemap]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CodemapFile`] or [`ConfigError::CodemapJson`]
    /// if the codemap file cannot be read or parsed.
    pub fn build_codemap(&self) -> Result<CodeMap, ConfigError> {
        let mut codemap = match &self.subscriber.codemap_file {
            Some(file) => self.read_codemap_file(file)?,
            None => CodeMap::new(),
        };
        codemap.extend(self.codemap.iter().map(|(code, key)| (code.clone(), key.clone())));
        Ok(codemap)
    }

    fn read_codemap_file(&self, file: &Path) -> Result<CodeMap, ConfigError> {
        let path = match &self.source_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file.to_path_buf(),
        };
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::CodemapFile {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::CodemapJson { path, source })
    }

    /// Converts every `[keymaps]` table into [`Keymaps`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyHandler`] for a table without an action
    /// and [`ConfigError::Handler`] for other invalid entries.
    pub fn build_keymaps(&self) -> Result<Keymaps, ConfigError> {
        let mut keymaps = Keymaps::new();
        for (device, entries) in &self.keymaps {
            for (key, entry) in entries {
                let handler = entry.clone().into_handler(key).map_err(|source| match source {
                    KeymapError::EmptyHandler { key } => ConfigError::EmptyHandler {
                        device: device.clone(),
                        key,
                    },
                    source => ConfigError::Handler {
                        device: device.clone(),
                        source,
                    },
                })?;
                keymaps.insert(device.clone(), key.clone(), handler);
            }
        }
        Ok(keymaps)
    }

    /// Devices to subscribe to: `devices`, or every keymap device if empty.
    pub fn subscribed_devices(&self) -> Vec<String> {
        if !self.subscriber.devices.is_empty() {
            return self.subscriber.devices.clone();
        }
        let mut devices: Vec<String> = self.keymaps.keys().cloned().collect();
        devices.sort();
        devices
    }

    /// Connection settings for [`crate::infrastructure::network::SubscriberConnection`].
    pub fn connection_config(&self) -> SubscriberConnectionConfig {
        SubscriberConnectionConfig {
            host: self.connection.host.clone(),
            port: self.connection.port,
            devices: self.subscribed_devices(),
            reconnect_interval: Duration::from_secs(self.connection.reconnect_interval_secs),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Default location of the subscriber config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from `path`, or from [`default_config_path`] when `None`.
///
/// A missing file yields [`SubscriberConfig::default()`].
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<SubscriberConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    let source_dir = path.parent().map(Path::to_path_buf);

    let mut config = match std::fs::read_to_string(&path) {
        Ok(content) => toml::from_str::<SubscriberConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => SubscriberConfig::default(),
        Err(e) => return Err(ConfigError::Io { path, source: e }),
    };
    config.source_dir = source_dir;
    Ok(config)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
