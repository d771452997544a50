//! Finite State Machine for the update action
//!
//! [`next_step`] is a pure decision on the current status; the client
//! performs the resulting I/O and feeds the outcome back through
//! [`Action::transition`].

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::ddi::links::{BoundedText, ARTIFACT_HREF_CAPACITY};

/// Delay before an `attempt` deployment starts
pub const ATTEMPT_DELAY: Duration = Duration::from_secs(15);

/// Execution status reported to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Cancellation was requested and performed
    Canceled,

    /// The update will not be installed at this time
    Rejected,

    /// Finished, in success or failure
    Closed,

    /// Downloading or installing
    Proceeding,

    /// Waiting for its start time
    Scheduled,

    /// Resumed after scheduling
    Resumed,
}

/// Outcome reported together with the status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionResult {
    None,
    Success,
    Failure,
}

/// Urgency the server assigned to a deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeploymentMode {
    #[default]
    None,
    Skip,
    Attempt,
    Force,
}

impl DeploymentMode {
    /// Map the `deployment.update` value; unknown or absent values are `None`
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("skip") => DeploymentMode::Skip,
            Some("attempt") => DeploymentMode::Attempt,
            Some("forced") => DeploymentMode::Force,
            _ => DeploymentMode::None,
        }
    }
}

/// What the client has to do next for the active action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Download and install the artifact now
    Install,

    /// Move to a new status/result
    Transition(ExecutionStatus, ExecutionResult),

    /// Nothing to do this cycle
    Hold,
}

/// Decide the next step for an action in `status`
pub fn next_step(status: ExecutionStatus, scheduled_at: Instant, now: Instant) -> Step {
    match status {
        ExecutionStatus::Proceeding => Step::Install,
        ExecutionStatus::Scheduled if now >= scheduled_at => {
            Step::Transition(ExecutionStatus::Proceeding, ExecutionResult::None)
        }
        ExecutionStatus::Scheduled => Step::Hold,
        ExecutionStatus::Canceled | ExecutionStatus::Closed => Step::Hold,
        // Anything else is pushed forward into proceeding
        ExecutionStatus::Rejected | ExecutionStatus::Resumed => {
            Step::Transition(ExecutionStatus::Proceeding, ExecutionResult::None)
        }
    }
}

/// The single unit of update work the device handles at a time
#[derive(Debug, Clone)]
pub struct Action {
    id: i64,
    mode: DeploymentMode,
    artifact_href: BoundedText<ARTIFACT_HREF_CAPACITY>,
    artifact_size: u64,
    status: ExecutionStatus,
    result: ExecutionResult,
    scheduled_at: Instant,
    feedback_dirty: bool,
}

impl Action {
    /// No action, status closed
    pub fn new(now: Instant) -> Self {
        Self {
            id: 0,
            mode: DeploymentMode::None,
            artifact_href: BoundedText::new(),
            artifact_size: 0,
            status: ExecutionStatus::Closed,
            result: ExecutionResult::None,
            scheduled_at: now,
            feedback_dirty: false,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// True while an action id is held
    pub fn is_active(&self) -> bool {
        self.id > 0
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn result(&self) -> ExecutionResult {
        self.result
    }

    pub fn scheduled_at(&self) -> Instant {
        self.scheduled_at
    }

    pub fn artifact_size(&self) -> u64 {
        self.artifact_size
    }

    pub fn artifact_href(&self) -> &str {
        self.artifact_href.as_str()
    }

    /// A status change has not been reported yet
    pub fn feedback_dirty(&self) -> bool {
        self.feedback_dirty
    }

    /// Set status and result; always marks the action for feedback
    pub fn transition(&mut self, status: ExecutionStatus, result: ExecutionResult) {
        self.status = status;
        self.result = result;
        self.feedback_dirty = true;
    }

    /// A feedback report was attempted, whatever its outcome
    pub fn feedback_attempted(&mut self) {
        self.feedback_dirty = false;
    }

    /// Take over a new action id
    pub fn adopt(&mut self, id: i64, mode: DeploymentMode) {
        self.id = id;
        self.mode = mode;
    }

    pub fn schedule(&mut self, at: Instant) {
        self.scheduled_at = at;
    }

    /// Store the artifact to install; returns true if the href was truncated
    pub fn set_artifact(&mut self, href: &str, size: u64) -> bool {
        self.artifact_size = size;
        self.artifact_href.set(href)
    }

    /// Take the artifact href, leaving it empty
    pub fn take_artifact_href(&mut self) -> String {
        self.artifact_href.take()
    }

    /// Forget the action id once it is closed and reported
    pub fn release(&mut self) {
        self.id = 0;
        self.mode = DeploymentMode::None;
        self.artifact_href.clear();
        self.artifact_size = 0;
    }
}
