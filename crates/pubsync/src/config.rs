//! Configuration management
//!
//! Settings are read from a JSON file and then overridden by environment
//! variables. The JSON keys and override names match existing deployments:
//!
//! ```json
//! {
//!   "level": "info",
//!   "cron": "0 */5 * * * *",
//!   "sleep": "30",
//!   "source-path": "PFT/",
//!   "destination-path": "/tmp/",
//!   "filename": "pubcodes.csv",
//!   "microservice-url": "https://pubcodes.svc:9000",
//!   "microservice-deleteall": "/api/v1/pubcodes/deleteall",
//!   "microservice-insertall": "/api/v1/pubcodes/insertall",
//!   "api-key": "...",
//!   "sftp": { "addr": "sftp.example.com:22", "user": "sync", "password": "...", "cipher": "aes256-ctr" }
//! }
//! ```

use figment::{
    providers::{Format, Json, Serialized},
    Figment,
};
use pubsync_common::{Result, SyncError};
use serde::{Deserialize, Deserializer, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::{
    client::{DownstreamSettings, DEFAULT_REQUEST_TIMEOUT_SECS},
    pipeline::CycleSettings,
    remote::sftp::{cipher_name, SftpSettings, DEFAULT_SFTP_TIMEOUT_SECS},
    scheduler::parse_schedule,
    transform::DEFAULT_META_INFO,
};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default config file path
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Default housekeeping sleep in seconds
pub const DEFAULT_SLEEP_SECS: u64 = 60;

/// Environment variables that override single config keys
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("LOG_LEVEL", "level"),
    ("CRON", "cron"),
    ("SOURCE_PATH", "source-path"),
    ("DESTINATION_PATH", "destination-path"),
    ("FILENAME", "filename"),
    ("SFTP_ADDR", "sftp.addr"),
    ("SFTP_USER", "sftp.user"),
    ("SFTP_PWD", "sftp.password"),
];

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub cron: String,
    /// Housekeeping sleep of the main loop, in seconds
    #[serde(default = "default_sleep", deserialize_with = "seconds")]
    pub sleep: u64,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub destination_path: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default, rename = "microservice-url")]
    pub url: String,
    #[serde(default, rename = "microservice-deleteall")]
    pub delete_all: String,
    #[serde(default, rename = "microservice-insertall")]
    pub insert_all: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_meta_info")]
    pub meta_info: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub sftp: SftpConfig,
}

/// SFTP endpoint section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SftpConfig {
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, alias = "pwd")]
    pub password: String,
    #[serde(default)]
    pub cipher: Option<String>,
}

fn default_sleep() -> u64 {
    DEFAULT_SLEEP_SECS
}

fn default_meta_info() -> String {
    DEFAULT_META_INFO.to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_SFTP_TIMEOUT_SECS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Accept `"30"` as well as `30`; older config files store numbers as strings
fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid number of seconds: {}", s))),
    }
}

/// Environment overrides as plain strings. Unset and empty variables are
/// skipped so they never blank out a value from the file.
fn env_overrides() -> Figment {
    ENV_OVERRIDES
        .iter()
        .fold(Figment::new(), |figment, (var, path)| match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => {
                figment.merge(Serialized::default(path, value))
            },
            _ => figment,
        })
}

impl Config {
    /// Load the config file, apply environment overrides and validate.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(SyncError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let config: Config = Figment::new()
            .merge(Json::file(&path))
            .merge(env_overrides())
            .extract()
            .map_err(|e| SyncError::config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Enforce the mandatory fields
    pub fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            return Err(SyncError::config("Config Level is a mandatory field"));
        }
        pubsync_common::logging::parse_level(&self.level)
            .map_err(|e| SyncError::config(e.to_string()))?;

        if self.cron.trim().is_empty() {
            return Err(SyncError::config("Config Cron is a mandatory field"));
        }
        parse_schedule(&self.cron)?;

        if self.sftp.user.is_empty() || self.sftp.password.is_empty() || self.sftp.addr.is_empty()
        {
            return Err(SyncError::config(
                "Sftp Config and child fields are mandatory",
            ));
        }
        if let Some(cipher) = self.sftp.cipher.as_deref().filter(|c| !c.trim().is_empty()) {
            cipher_name(cipher)?;
        }

        if self.source_path.is_empty() || self.destination_path.is_empty() || self.filename.is_empty()
        {
            return Err(SyncError::config(
                "File paths and filename are mandatory fields",
            ));
        }

        if self.url.is_empty() {
            return Err(SyncError::config("Config microservice-url is a mandatory field"));
        }

        if self.sleep == 0 {
            return Err(SyncError::config("Config sleep must be greater than 0"));
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(SyncError::config("Timeouts must be greater than 0"));
        }

        Ok(())
    }

    /// Remote path of the watched file (`source-path` + `filename`)
    pub fn remote_file(&self) -> String {
        format!("{}{}", self.source_path, self.filename)
    }

    /// Local staging path (`destination-path` + `filename`)
    pub fn staging_file(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.destination_path, self.filename))
    }

    pub fn sleep_interval(&self) -> Duration {
        Duration::from_secs(self.sleep)
    }

    pub fn sftp_settings(&self) -> SftpSettings {
        SftpSettings {
            addr: self.sftp.addr.clone(),
            user: self.sftp.user.clone(),
            password: self.sftp.password.clone(),
            cipher: self.sftp.cipher.clone().filter(|c| !c.trim().is_empty()),
            timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn downstream_settings(&self) -> DownstreamSettings {
        DownstreamSettings {
            base_url: self.url.clone(),
            delete_path: self.delete_all.clone(),
            insert_path: self.insert_all.clone(),
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            remote_path: self.remote_file(),
            staging_path: self.staging_file(),
            meta_info: self.meta_info.clone(),
        }
    }
}
