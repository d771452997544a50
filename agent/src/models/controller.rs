//! Root controller resource models

use serde::{Deserialize, Serialize};

/// Reply to a poll of the root controller resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerBase {
    /// Controller configuration pushed by the server
    #[serde(default)]
    pub config: Option<ControllerConfig>,

    /// Links to outstanding work
    #[serde(rename = "_links", default)]
    pub links: Option<Links>,
}

impl ControllerBase {
    /// The `config.polling.sleep` hint, if present
    pub fn polling_sleep(&self) -> Option<&str> {
        self.config
            .as_ref()
            .and_then(|c| c.polling.as_ref())
            .and_then(|p| p.sleep.as_deref())
    }
}

/// Controller configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub polling: Option<Polling>,
}

/// Polling configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Polling {
    /// Interval between polls as `HH:MM:SS`
    #[serde(default)]
    pub sleep: Option<String>,
}

/// Links to outstanding work
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Links {
    #[serde(default)]
    pub deployment_base: Option<Link>,

    #[serde(default)]
    pub config_data: Option<Link>,

    #[serde(default)]
    pub cancel_action: Option<Link>,
}

/// A hypermedia reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
}

impl Link {
    /// The href of an optional link, empty when absent
    pub fn href_of(link: &Option<Link>) -> &str {
        link.as_ref().map(|l| l.href.as_str()).unwrap_or("")
    }
}
