//! Server identity and credentials

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// How the device authenticates against the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialKind {
    /// Mutual TLS, enforced by the transport
    ClientCertificate,

    /// Tenant-wide gateway security token
    GatewayToken,

    /// Per-device target security token
    TargetToken,

    #[default]
    None,
}

impl CredentialKind {
    /// Authorization scheme name, for the kinds that send one
    pub fn scheme(&self) -> Option<&'static str> {
        match self {
            CredentialKind::GatewayToken => Some("GatewayToken"),
            CredentialKind::TargetToken => Some("TargetToken"),
            CredentialKind::ClientCertificate | CredentialKind::None => None,
        }
    }
}

/// Where and as whom the device talks to the server.
///
/// Fixed at construction; the client never mutates it.
#[derive(Debug)]
pub struct ServerIdentity {
    pub host: String,
    pub port: u16,
    pub tenant_id: String,
    pub controller_id: String,
    pub credential: SecretString,
    pub credential_kind: CredentialKind,
}

impl ServerIdentity {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        tenant_id: impl Into<String>,
        controller_id: impl Into<String>,
        credential: impl Into<String>,
        credential_kind: CredentialKind,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            tenant_id: tenant_id.into(),
            controller_id: controller_id.into(),
            credential: SecretString::from(credential.into()),
            credential_kind,
        }
    }

    /// Path of the root controller resource
    pub fn controller_path(&self) -> String {
        format!("{}/controller/v1/{}", self.tenant_id, self.controller_id)
    }

    /// Path of the config data resource
    pub fn config_data_path(&self) -> String {
        format!("{}/configData", self.controller_path())
    }

    /// Path of the feedback resource for an action
    pub fn feedback_path(&self, action_id: i64) -> String {
        format!(
            "{}/deploymentBase/{}/feedback",
            self.controller_path(),
            action_id
        )
    }
}
