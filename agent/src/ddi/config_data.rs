//! Config data pushed to the server

use chrono::Utc;
use serde_json::value::RawValue;
use tracing::{debug, info, warn};

use crate::ddi::identity::ServerIdentity;
use crate::deploy::fsm::Action;
use crate::errors::DdiError;
use crate::http::client::HttpClient;
use crate::http::href::Href;
use crate::http::transport::Transport;
use crate::models::feedback::{ConfigDataMode, ConfigDataRequest};

/// Largest config data fragment accepted, in bytes
pub const CONFIG_DATA_CAPACITY: usize = 1024;

/// Caller-supplied JSON fragment sent as the `data` of a config push.
///
/// Unlike links this is never truncated: a cut JSON text would no longer
/// parse, so oversized fragments are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDataPayload {
    json: String,
}

impl Default for ConfigDataPayload {
    fn default() -> Self {
        Self {
            json: "{}".to_string(),
        }
    }
}

impl ConfigDataPayload {
    /// Validate and store a JSON fragment of at most [`CONFIG_DATA_CAPACITY`] bytes
    pub fn parse(json: &str) -> Result<Self, DdiError> {
        let json = json.trim();
        if json.len() > CONFIG_DATA_CAPACITY {
            return Err(DdiError::ConfigError(format!(
                "config data is {} bytes, at most {} allowed",
                json.len(),
                CONFIG_DATA_CAPACITY
            )));
        }
        serde_json::from_str::<&RawValue>(json)
            .map_err(|e| DdiError::ConfigError(format!("config data is not JSON: {}", e)))?;
        Ok(Self {
            json: json.to_string(),
        })
    }

    /// Serialize `value` as the payload
    pub fn from_value<V: serde::Serialize>(value: &V) -> Result<Self, DdiError> {
        Self::parse(&serde_json::to_string(value)?)
    }

    /// The fragment as a raw JSON value
    pub fn as_raw(&self) -> Result<&RawValue, DdiError> {
        Ok(serde_json::from_str(&self.json)?)
    }

    pub fn as_str(&self) -> &str {
        &self.json
    }
}

/// PUT the payload to the config data resource.
///
/// Failures are logged and otherwise ignored; the next configData link
/// triggers another push.
pub async fn push_config_data<T: Transport>(
    http: &mut HttpClient<T>,
    identity: &ServerIdentity,
    action: &Action,
    payload: &ConfigDataPayload,
    mode: ConfigDataMode,
) {
    let data = match payload.as_raw() {
        Ok(data) => data,
        Err(e) => {
            warn!("Config data not pushed: {}", e);
            return;
        }
    };
    let request = ConfigDataRequest::new(
        action.id(),
        Utc::now(),
        action.status(),
        action.result(),
        data,
        mode,
    );
    let href = Href::new(&identity.host, identity.port, identity.config_data_path());

    info!("Pushing config data ({:?})", mode);
    debug!("Config data: {}", payload.as_str());
    if let Err(e) = http.put(&href, &request).await {
        warn!("Config data push failed: {}", e);
    }
}
