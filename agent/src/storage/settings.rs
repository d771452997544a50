//! Settings file management

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::ddi::identity::CredentialKind;
use crate::errors::DdiError;
use crate::http::href::DEFAULT_HTTPS_PORT;
use crate::logs::LogLevel;

/// Default location of the settings file
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/ddi-agent/settings.json";

/// Agent settings
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for rolling log files; stdout only when absent
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Update server
    pub server: ServerSettings,

    /// How the device authenticates
    #[serde(default)]
    pub credential: CredentialSettings,

    /// Interval between client ticks in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Transport timeouts
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Where the firmware image is written
    #[serde(default)]
    pub firmware: FirmwareSettings,

    /// Extra attributes pushed as config data
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// What to do after an action was closed
    #[serde(default)]
    pub restart_policy: RestartPolicy,
}

impl Settings {
    /// Read the settings from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DdiError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).await.map_err(|e| {
            DdiError::ConfigError(format!("Unable to read {}: {}", path.display(), e))
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, DdiError> {
        let settings: Settings = serde_json::from_str(contents)
            .map_err(|e| DdiError::ConfigError(format!("Invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), DdiError> {
        if self.server.host.is_empty() {
            return Err(DdiError::ConfigError("server.host is empty".to_string()));
        }
        if self.server.controller_id.is_empty() {
            return Err(DdiError::ConfigError("server.controller_id is empty".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(DdiError::ConfigError("tick_interval_ms must be positive".to_string()));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_tick_interval() -> u64 {
    1000
}

/// Update server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_tenant")]
    pub tenant_id: String,

    pub controller_id: String,

    /// Use TLS
    #[serde(default = "default_true")]
    pub tls: bool,

    /// Optional path to a PEM-encoded CA certificate for server TLS verification.
    /// When absent, the system certificate store is used.
    #[serde(default)]
    pub ca_cert_path: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_HTTPS_PORT
}

fn default_tenant() -> String {
    "DEFAULT".to_string()
}

/// Credential settings
#[derive(Debug, Deserialize)]
pub struct CredentialSettings {
    #[serde(default)]
    pub kind: CredentialKind,

    /// Security token; ignored for `none` and `client-certificate`
    #[serde(default = "empty_secret")]
    pub token: SecretString,
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            kind: CredentialKind::None,
            token: empty_secret(),
        }
    }
}

/// Transport timeout settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,

    #[serde(default = "default_io_secs")]
    pub io_secs: u64,
}

fn default_connect_secs() -> u64 {
    10
}

fn default_io_secs() -> u64 {
    30
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            io_secs: default_io_secs(),
        }
    }
}

/// Firmware installer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareSettings {
    /// Final path of the installed image
    #[serde(default = "default_target_path")]
    pub target_path: PathBuf,
}

fn default_target_path() -> PathBuf {
    PathBuf::from("/var/lib/ddi-agent/firmware.bin")
}

impl Default for FirmwareSettings {
    fn default() -> Self {
        Self {
            target_path: default_target_path(),
        }
    }
}

/// Handling of a closed action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartPolicy {
    /// Exit the process and leave the restart to the supervisor
    #[default]
    Exit,

    /// Rebuild the client and initialize it again in-process
    Reinitialize,
}
