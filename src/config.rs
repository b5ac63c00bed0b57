//! Configuration management for notesync.
//!
//! This module handles loading and saving application configuration to/from
//! a JSON file. The config directory can be customized.
//!
//! Includes sync-related configuration:
//! - device_id: UUID7 identifying this device (generated on first run)
//! - device_name: Human-readable device name
//! - sync: Remote store location and background-sync settings

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{NoteError, NoteResult};

/// Tag under which the background-sync intent is registered with the host
pub const DEFAULT_BACKGROUND_SYNC_TAG: &str = "sync-notes";

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of the notes API (e.g. "https://example.com/api")
    #[serde(default)]
    pub remote_url: Option<String>,
    /// Per-request timeout; 0 disables it
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_background_sync_tag")]
    pub background_sync_tag: String,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_background_sync_tag() -> String {
    DEFAULT_BACKGROUND_SYNC_TAG.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            remote_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            background_sync_tag: default_background_sync_tag(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigData {
    /// Path to the database file
    #[serde(default)]
    pub database_file: String,
    /// Device ID (UUID7 hex)
    #[serde(default = "generate_device_id")]
    pub device_id: String,
    /// Human-readable device name
    #[serde(default = "get_default_device_name")]
    pub device_name: String,
    /// Sync configuration
    #[serde(default)]
    pub sync: SyncConfig,
}

fn generate_device_id() -> String {
    Uuid::now_v7().simple().to_string()
}

fn get_default_device_name() -> String {
    #[cfg(feature = "desktop")]
    {
        match hostname::get() {
            Ok(name) => format!("Notes on {}", name.to_string_lossy()),
            Err(_) => "Notes Device".to_string(),
        }
    }
    #[cfg(not(feature = "desktop"))]
    {
        "Notes Mobile".to_string()
    }
}

impl Default for ConfigData {
    fn default() -> Self {
        Self {
            database_file: String::new(),
            device_id: generate_device_id(),
            device_name: get_default_device_name(),
            sync: SyncConfig::default(),
        }
    }
}

/// Configuration manager
pub struct Config {
    config_dir: PathBuf,
    config_file: PathBuf,
    data: ConfigData,
}

impl Config {
    /// Create a new configuration manager
    ///
    /// On mobile platforms (without the `desktop` feature), `config_dir` is required.
    pub fn new(config_dir: Option<PathBuf>) -> NoteResult<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => {
                #[cfg(feature = "desktop")]
                {
                    dirs::config_dir()
                        .unwrap_or_else(|| PathBuf::from("."))
                        .join("notesync")
                }
                #[cfg(not(feature = "desktop"))]
                {
                    return Err(NoteError::Config(
                        "config_dir is required on mobile platforms".to_string(),
                    ));
                }
            }
        };

        fs::create_dir_all(&config_dir)?;
        let config_file = config_dir.join("config.json");

        let default_data = || {
            let mut default = ConfigData::default();
            default.database_file = config_dir.join("notes.db").to_string_lossy().to_string();
            default
        };

        let mut data = if config_file.exists() {
            match fs::read_to_string(&config_file) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Unreadable config file, using defaults");
                    default_data()
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not read config file, using defaults");
                    default_data()
                }
            }
        } else {
            default_data()
        };
        if data.database_file.is_empty() {
            data.database_file = config_dir.join("notes.db").to_string_lossy().to_string();
        }

        let config = Self {
            config_dir,
            config_file,
            data,
        };

        // Save default config if it doesn't exist
        if !config.config_file.exists() {
            config.save()?;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> NoteResult<()> {
        let content = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.config_file, content)?;
        Ok(())
    }

    /// Get the configuration directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the database file path
    pub fn database_file(&self) -> &str {
        &self.data.database_file
    }

    /// Get the device ID
    pub fn device_id(&self) -> NoteResult<Uuid> {
        Uuid::parse_str(&self.data.device_id)
            .map_err(|e| NoteError::Config(format!("Invalid device_id: {}", e)))
    }

    /// Get the device ID as hex string
    pub fn device_id_hex(&self) -> &str {
        &self.data.device_id
    }

    /// Get the human-readable device name
    pub fn device_name(&self) -> &str {
        &self.data.device_name
    }

    /// Set the device name
    pub fn set_device_name(&mut self, name: &str) -> NoteResult<()> {
        self.data.device_name = name.to_string();
        self.save()
    }

    /// Get sync configuration
    pub fn sync_config(&self) -> &SyncConfig {
        &self.data.sync
    }

    /// Check if sync is enabled
    pub fn is_sync_enabled(&self) -> bool {
        self.data.sync.enabled
    }

    /// Enable or disable sync
    pub fn set_sync_enabled(&mut self, enabled: bool) -> NoteResult<()> {
        self.data.sync.enabled = enabled;
        self.save()
    }

    /// Get the remote notes API URL
    pub fn remote_url(&self) -> Option<&str> {
        self.data.sync.remote_url.as_deref()
    }

    /// Set the remote notes API URL
    pub fn set_remote_url(&mut self, url: &str) -> NoteResult<()> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(NoteError::validation(
                "remote_url",
                "must start with http:// or https://",
            ));
        }
        self.data.sync.remote_url = Some(url.to_string());
        self.save()
    }

    /// Per-request timeout for the remote gateway
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.data.sync.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Set the per-request timeout in seconds (0 disables it)
    pub fn set_request_timeout_secs(&mut self, secs: u64) -> NoteResult<()> {
        self.data.sync.request_timeout_secs = secs;
        self.save()
    }

    /// Tag used for the host platform's background-sync registration
    pub fn background_sync_tag(&self) -> &str {
        &self.data.sync.background_sync_tag
    }

    /// Check that sync can run: enabled and pointed at a remote store
    pub fn is_sync_configured(&self) -> bool {
        self.is_sync_enabled() && self.remote_url().is_some()
    }
}
