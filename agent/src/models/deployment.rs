//! Deployment and cancel action models

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::controller::Link;

/// Reply to a fetch of the deployment base resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentBase {
    /// Action ID
    #[serde(deserialize_with = "deserialize_action_id")]
    pub id: i64,

    /// Deployment details
    #[serde(default)]
    pub deployment: Option<Deployment>,
}

impl DeploymentBase {
    /// The raw `deployment.update` value
    pub fn update_mode(&self) -> Option<&str> {
        self.deployment.as_ref().and_then(|d| d.update.as_deref())
    }

    /// The first artifact of the first chunk; further ones are ignored
    pub fn first_artifact(&self) -> Option<&Artifact> {
        self.deployment
            .as_ref()
            .and_then(|d| d.chunks.first())
            .and_then(|c| c.artifacts.first())
    }
}

/// Deployment details
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deployment {
    /// Download handling: `skip`, `attempt` or `forced`
    #[serde(default)]
    pub download: Option<String>,

    /// Update handling: `skip`, `attempt` or `forced`
    #[serde(default)]
    pub update: Option<String>,

    /// Software chunks
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

/// A software module of a deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default)]
    pub part: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

/// A downloadable file of a chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub filename: Option<String>,

    /// Size in bytes
    #[serde(default)]
    pub size: u64,

    #[serde(rename = "_links", default)]
    pub links: ArtifactLinks,
}

impl Artifact {
    /// Download reference, preferring the HTTPS link
    pub fn download_href(&self) -> &str {
        match Link::href_of(&self.links.download) {
            "" => Link::href_of(&self.links.download_http),
            href => href,
        }
    }
}

/// Download links of an artifact
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactLinks {
    #[serde(default)]
    pub download: Option<Link>,

    #[serde(rename = "download-http", default)]
    pub download_http: Option<Link>,
}

/// Reply to a fetch of the cancel action resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelActionBase {
    #[serde(default, deserialize_with = "deserialize_optional_action_id")]
    pub id: Option<i64>,

    #[serde(rename = "cancelAction")]
    pub cancel_action: CancelAction,
}

/// Cancellation details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAction {
    /// ID of the action to stop
    #[serde(rename = "stopId", deserialize_with = "deserialize_action_id")]
    pub stop_id: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ActionIdRepr {
    Number(i64),
    Text(String),
}

impl ActionIdRepr {
    fn into_id(self) -> i64 {
        match self {
            ActionIdRepr::Number(id) => id,
            // Non-numeric ids read as 0, i.e. "no action"
            ActionIdRepr::Text(text) => text.trim().parse().unwrap_or(0),
        }
    }
}

/// Action ids arrive as strings but numbers are accepted too
fn deserialize_action_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    ActionIdRepr::deserialize(deserializer).map(ActionIdRepr::into_id)
}

fn deserialize_optional_action_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    Option::<ActionIdRepr>::deserialize(deserializer).map(|id| id.map(ActionIdRepr::into_id))
}
