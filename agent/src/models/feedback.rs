//! Feedback and config data request bodies

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::value::RawValue;

use crate::deploy::fsm::{ExecutionResult, ExecutionStatus};

/// Format of the `time` field, e.g. `20240102T030405`
pub const FEEDBACK_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Format a timestamp for a feedback envelope
pub fn feedback_time(time: DateTime<Utc>) -> String {
    time.format(FEEDBACK_TIME_FORMAT).to_string()
}

/// Body of a deployment feedback POST
#[derive(Debug, Clone, Serialize)]
pub struct Feedback {
    /// Action ID as text
    pub id: String,
    pub time: String,
    pub status: FeedbackStatus,
}

impl Feedback {
    pub fn new(
        action_id: i64,
        time: DateTime<Utc>,
        execution: ExecutionStatus,
        finished: ExecutionResult,
    ) -> Self {
        Self {
            id: action_id.to_string(),
            time: feedback_time(time),
            status: FeedbackStatus {
                execution,
                result: FeedbackResult { finished },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackStatus {
    pub execution: ExecutionStatus,
    pub result: FeedbackResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResult {
    pub finished: ExecutionResult,
}

/// How the server combines pushed attributes with stored ones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigDataMode {
    #[default]
    Merge,
    Replace,
    Remove,
}

/// Body of a config data PUT; `data` is embedded verbatim
#[derive(Debug, Serialize)]
pub struct ConfigDataRequest<'a> {
    pub id: String,
    pub time: String,
    pub status: FeedbackStatus,
    pub data: &'a RawValue,
    pub mode: ConfigDataMode,
}

impl<'a> ConfigDataRequest<'a> {
    pub fn new(
        action_id: i64,
        time: DateTime<Utc>,
        execution: ExecutionStatus,
        finished: ExecutionResult,
        data: &'a RawValue,
        mode: ConfigDataMode,
    ) -> Self {
        Self {
            id: action_id.to_string(),
            time: feedback_time(time),
            status: FeedbackStatus {
                execution,
                result: FeedbackResult { finished },
            },
            data,
            mode,
        }
    }
}
