//! Artifact download and install

use tracing::{error, info, warn};

use crate::deploy::fsm::{Action, ExecutionResult, ExecutionStatus};
use crate::errors::DdiError;
use crate::http::client::HttpClient;
use crate::http::href::Href;
use crate::http::transport::Transport;
use crate::installer::FirmwareInstaller;

/// Stream the action's artifact into `installer` and close the action.
///
/// The artifact reference is consumed whatever happens, so a failed
/// download is never retried; the action closes with `failure`.
pub async fn execute_update<T, I>(http: &mut HttpClient<T>, installer: &mut I, action: &mut Action)
where
    T: Transport,
    I: FirmwareInstaller + ?Sized,
{
    let href = Href::resolve(&action.take_artifact_href());
    if href.is_unresolved() {
        warn!("Action {} has no usable artifact reference", action.id());
        action.transition(ExecutionStatus::Closed, ExecutionResult::Failure);
        return;
    }

    info!(
        "Installing artifact for action {} from {} ({} bytes)",
        action.id(),
        href,
        action.artifact_size()
    );

    match http.download(&href, action.artifact_size(), installer).await {
        Ok(written) if installer.is_finished() => {
            info!("Update installed ({} bytes)", written);
            action.transition(ExecutionStatus::Closed, ExecutionResult::Success);
        }
        Ok(written) => {
            let code = installer.last_error().map(|e| e.code()).unwrap_or_default();
            error!("Update not finished after {} bytes, error #{}", written, code);
            action.transition(ExecutionStatus::Closed, ExecutionResult::Failure);
        }
        Err(DdiError::InstallError(e)) => {
            error!("Update failed, error #{}: {}", e.code(), e);
            action.transition(ExecutionStatus::Closed, ExecutionResult::Failure);
        }
        Err(e) => {
            error!("Artifact download failed: {}", e);
            action.transition(ExecutionStatus::Closed, ExecutionResult::Failure);
        }
    }
}
