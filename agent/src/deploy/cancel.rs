//! Server-requested cancellation

use tracing::{info, warn};

use crate::ddi::links::LinkSet;
use crate::deploy::fsm::{Action, DeploymentMode, ExecutionResult, ExecutionStatus};
use crate::errors::DdiError;
use crate::http::client::HttpClient;
use crate::http::href::Href;
use crate::http::transport::Transport;
use crate::models::deployment::CancelActionBase;

/// Fetch the `cancelAction` link and mark the named action canceled
pub async fn check_cancel<T: Transport>(
    http: &mut HttpClient<T>,
    links: &mut LinkSet,
    action: &mut Action,
) -> Result<(), DdiError> {
    if links.cancel_action.is_empty() {
        return Ok(());
    }

    let href = Href::resolve(&links.cancel_action.take());
    if href.is_unresolved() {
        warn!("Ignoring cancelAction link without a host");
        return Ok(());
    }

    let cancel: CancelActionBase = http.get(&href).await?;
    apply_cancel(action, cancel.cancel_action.stop_id);
    Ok(())
}

/// Cancel `stop_id`.
///
/// Cancelling the current action succeeds; a notice for any other id takes
/// that id over and reports a failed cancellation. A stop id that is not
/// positive is ignored.
pub fn apply_cancel(action: &mut Action, stop_id: i64) {
    if stop_id <= 0 {
        warn!("Ignoring cancel with invalid stop id {}", stop_id);
    } else if stop_id == action.id() {
        info!("Canceling action {}", stop_id);
        action.transition(ExecutionStatus::Canceled, ExecutionResult::Success);
    } else {
        info!("Cancel for unknown action {} (current {})", stop_id, action.id());
        action.adopt(stop_id, DeploymentMode::None);
        action.transition(ExecutionStatus::Canceled, ExecutionResult::Failure);
    }
}
