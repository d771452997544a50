//! Application configuration options

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::ddi::identity::{CredentialKind, ServerIdentity};
use crate::http::transport::Timeouts;
use crate::storage::settings::{RestartPolicy, ServerSettings, Settings};
use crate::workers::poller;

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Update server
    pub server: ServerSettings,

    /// How the device authenticates
    pub credential_kind: CredentialKind,

    /// Security token for the token kinds
    pub credential: SecretString,

    /// Transport timeouts
    pub timeouts: Timeouts,

    /// Final path of the installed firmware image
    pub firmware_path: PathBuf,

    /// Attributes added to the host ones in config data
    pub attributes: BTreeMap<String, String>,

    /// Poller worker options
    pub poller: poller::Options,

    /// What to do after an action was closed
    pub restart_policy: RestartPolicy,
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            server: settings.server.clone(),
            credential_kind: settings.credential.kind,
            credential: SecretString::from(settings.credential.token.expose_secret().to_owned()),
            timeouts: Timeouts {
                connect: Duration::from_secs(settings.timeouts.connect_secs),
                io: Duration::from_secs(settings.timeouts.io_secs),
            },
            firmware_path: settings.firmware.target_path.clone(),
            attributes: settings.attributes.clone(),
            poller: poller::Options {
                tick_interval: Duration::from_millis(settings.tick_interval_ms),
            },
            restart_policy: settings.restart_policy,
        }
    }

    /// The identity the client presents to the server
    pub fn identity(&self) -> ServerIdentity {
        ServerIdentity::new(
            &self.server.host,
            self.server.port,
            &self.server.tenant_id,
            &self.server.controller_id,
            self.credential.expose_secret(),
            self.credential_kind,
        )
    }
}
