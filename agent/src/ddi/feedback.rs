//! Status feedback for the current action

use chrono::Utc;
use tracing::{info, warn};

use crate::ddi::identity::ServerIdentity;
use crate::deploy::fsm::{Action, ExecutionResult, ExecutionStatus};
use crate::http::client::HttpClient;
use crate::http::href::Href;
use crate::http::transport::Transport;
use crate::models::feedback::Feedback;

/// POST the action's status and result.
///
/// The outcome is logged only; the caller clears the dirty flag either way.
pub async fn post_feedback<T: Transport>(
    http: &mut HttpClient<T>,
    identity: &ServerIdentity,
    action: &Action,
) {
    let feedback = Feedback::new(action.id(), Utc::now(), action.status(), action.result());
    let href = Href::new(
        &identity.host,
        identity.port,
        identity.feedback_path(action.id()),
    );

    info!(
        "Feedback for action {}: {:?}/{:?}",
        action.id(),
        action.status(),
        action.result()
    );
    if let Err(e) = http.post(&href, &feedback).await {
        warn!("Feedback for action {} failed: {}", action.id(), e);
    }
}

/// Close a canceled action and report it.
///
/// The result reflects whether the action was in `canceled` when this ran.
pub async fn post_cancel_feedback<T: Transport>(
    http: &mut HttpClient<T>,
    identity: &ServerIdentity,
    action: &mut Action,
) {
    close_canceled(action);
    post_feedback(http, identity, action).await;
}

/// Force a canceled action to `closed`
pub fn close_canceled(action: &mut Action) {
    let result = if action.status() == ExecutionStatus::Canceled {
        ExecutionResult::Success
    } else {
        ExecutionResult::Failure
    };
    action.transition(ExecutionStatus::Closed, result);
}
