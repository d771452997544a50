//! Turns a pending deployment into the current action

use std::time::Instant;

use tracing::{info, warn};

use crate::ddi::links::LinkSet;
use crate::deploy::fsm::{Action, DeploymentMode, ExecutionResult, ExecutionStatus, ATTEMPT_DELAY};
use crate::errors::DdiError;
use crate::http::client::HttpClient;
use crate::http::href::Href;
use crate::http::transport::Transport;
use crate::models::deployment::DeploymentBase;

/// Fetch the deployment behind the `deploymentBase` link.
///
/// Does nothing while an action is active. The link is consumed before the
/// request goes out, so a failed fetch waits for the next poll.
pub async fn fetch_deployment<T: Transport>(
    http: &mut HttpClient<T>,
    links: &mut LinkSet,
    action: &mut Action,
    now: Instant,
) -> Result<(), DdiError> {
    if links.deployment_base.is_empty() || action.is_active() {
        return Ok(());
    }

    let href = Href::resolve(&links.deployment_base.take());
    if href.is_unresolved() {
        warn!("Ignoring deploymentBase link without a host");
        return Ok(());
    }

    let base: DeploymentBase = http.get(&href).await?;
    apply_deployment(action, &base, now);
    Ok(())
}

/// Enter a freshly fetched deployment into the action state.
///
/// A deployment without a positive id is ignored and leaves the action as is.
pub fn apply_deployment(action: &mut Action, base: &DeploymentBase, now: Instant) {
    if base.id <= 0 {
        warn!("Ignoring deployment with invalid action id {}", base.id);
        return;
    }

    let mode = DeploymentMode::parse(base.update_mode());
    info!("Deployment {} with update mode {:?}", base.id, mode);

    if let Some(artifact) = base.first_artifact() {
        if action.set_artifact(artifact.download_href(), artifact.size) {
            warn!("Artifact reference was truncated");
        }
    }

    if action.status() != ExecutionStatus::Closed {
        return;
    }

    match mode {
        DeploymentMode::Force => {
            action.adopt(base.id, mode);
            action.transition(ExecutionStatus::Proceeding, ExecutionResult::None);
            action.schedule(now);
        }
        DeploymentMode::Attempt => {
            action.adopt(base.id, mode);
            action.transition(ExecutionStatus::Scheduled, ExecutionResult::None);
            action.schedule(now + ATTEMPT_DELAY);
        }
        DeploymentMode::Skip | DeploymentMode::None => {
            info!("Deployment {} not taken up in mode {:?}", base.id, mode);
        }
    }
}
