//! Job status snapshots.

use serde::{Deserialize, Serialize};
use sforge_client::soap::{DecodeError, Envelope, Node};

/// State of a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Pending,
    InProgress,
    Canceling,
    Succeeded,
    SucceededPartial,
    Failed,
    Canceled,
}

impl JobState {
    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::SucceededPartial | JobState::Failed | JobState::Canceled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "Queued",
            JobState::Pending => "Pending",
            JobState::InProgress => "InProgress",
            JobState::Canceling => "Canceling",
            JobState::Succeeded => "Succeeded",
            JobState::SucceededPartial => "SucceededPartial",
            JobState::Failed => "Failed",
            JobState::Canceled => "Canceled",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(JobState::Queued),
            "Pending" => Ok(JobState::Pending),
            "InProgress" => Ok(JobState::InProgress),
            "Canceling" => Ok(JobState::Canceling),
            "Succeeded" => Ok(JobState::Succeeded),
            "SucceededPartial" => Ok(JobState::SucceededPartial),
            "Failed" => Ok(JobState::Failed),
            "Canceled" => Ok(JobState::Canceled),
            // checkStatus (AsyncResult) names
            "Completed" => Ok(JobState::Succeeded),
            "Error" => Ok(JobState::Failed),
            _ => Err(format!("Unknown job state: {}", s)),
        }
    }
}

/// Component and test counters reported while a deploy runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounts {
    pub components_deployed: u32,
    pub components_total: u32,
    pub component_errors: u32,
    pub tests_completed: u32,
    pub tests_total: u32,
    pub test_errors: u32,
}

impl ProgressCounts {
    fn from_result(result: &Node) -> Option<Self> {
        if !result.contains("numberComponentsTotal") && !result.contains("numberTestsTotal") {
            return None;
        }
        Some(Self {
            components_deployed: result.parse_child("numberComponentsDeployed").unwrap_or(0),
            components_total: result.parse_child("numberComponentsTotal").unwrap_or(0),
            component_errors: result.parse_child("numberComponentErrors").unwrap_or(0),
            tests_completed: result.parse_child("numberTestsCompleted").unwrap_or(0),
            tests_total: result.parse_child("numberTestsTotal").unwrap_or(0),
            test_errors: result.parse_child("numberTestErrors").unwrap_or(0),
        })
    }
}

/// A message attached to a retrieve result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveMessage {
    pub file_name: String,
    pub problem: String,
}

/// One observed status of a job.
///
/// Each poll yields a fresh snapshot; `done` always equals
/// `state.is_terminal()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub id: String,
    pub state: JobState,
    pub done: bool,
    pub progress: Option<ProgressCounts>,
    pub state_detail: Option<String>,
    pub error_message: Option<String>,
    pub error_status_code: Option<String>,
    /// The `details` element of a deploy result.
    pub detail: Option<Node>,
    /// Base64 zip of a retrieve result, as received.
    pub zip_file: Option<String>,
    pub messages: Vec<RetrieveMessage>,
    pub debug_log: Option<String>,
    /// Set when polling itself failed. The state is then `Failed`.
    pub poll_error: Option<String>,
}

impl JobStatus {
    /// Decode the `{operation}Response/result` of a status response.
    pub fn from_envelope(envelope: &Envelope, operation: &str) -> Result<Self, DecodeError> {
        let result = envelope.result(operation)?;
        let base = format!("Envelope/Body/{operation}Response/result");
        let mut status = Self::from_result(result, &base)?;
        status.debug_log = envelope.debug_log().map(str::to_string);
        Ok(status)
    }

    /// Decode a result node. `base` is the node's key path, used in errors.
    ///
    /// Deploy and retrieve results name the state `status`; the legacy
    /// AsyncResult names it `state`.
    pub fn from_result(result: &Node, base: &str) -> Result<Self, DecodeError> {
        let (key, raw_state) = match (result.child_text("status"), result.child_text("state")) {
            (Some(status), _) => ("status", status),
            (None, Some(state)) => ("state", state),
            (None, None) => {
                return Err(DecodeError::MissingKey {
                    path: format!("{base}/status"),
                })
            }
        };
        let state: JobState =
            raw_state
                .trim()
                .parse()
                .map_err(|_| DecodeError::UnexpectedValue {
                    path: format!("{base}/{key}"),
                    value: raw_state.to_string(),
                })?;

        let messages = result
            .all("messages")
            .iter()
            .map(|m| RetrieveMessage {
                file_name: m.child_text("fileName").unwrap_or_default().to_string(),
                problem: m.child_text("problem").unwrap_or_default().to_string(),
            })
            .collect();

        Ok(Self {
            id: result.child_text("id").unwrap_or_default().to_string(),
            state,
            done: state.is_terminal(),
            progress: ProgressCounts::from_result(result),
            state_detail: result.child_text("stateDetail").map(str::to_string),
            error_message: result
                .child_text("errorMessage")
                .or_else(|| result.child_text("message"))
                .map(str::to_string),
            error_status_code: result
                .child_text("errorStatusCode")
                .or_else(|| result.child_text("statusCode"))
                .map(str::to_string),
            detail: result.get("details").cloned(),
            zip_file: result.child_text("zipFile").map(str::to_string),
            messages,
            debug_log: None,
            poll_error: None,
        })
    }

    /// Terminal status for a poll that could not complete.
    pub fn poll_failure(id: impl Into<String>, error: impl std::fmt::Display) -> Self {
        let error = error.to_string();
        Self {
            id: id.into(),
            state: JobState::Failed,
            done: true,
            progress: None,
            state_detail: None,
            error_message: Some(error.clone()),
            error_status_code: None,
            detail: None,
            zip_file: None,
            messages: Vec::new(),
            debug_log: None,
            poll_error: Some(error),
        }
    }

    /// One line describing this snapshot, e.g.
    /// `[deploy] Request Status: InProgress (3/10)  -- Deploying`.
    ///
    /// Once every component is deployed the test counters are shown instead.
    pub fn progress_line(&self, label: &str) -> String {
        match (&self.state_detail, self.progress) {
            (Some(detail), Some(counts)) => {
                if counts.components_deployed < counts.components_total {
                    format!(
                        "[{label}] Request Status: {} ({}/{})  -- {detail}",
                        self.state, counts.components_deployed, counts.components_total
                    )
                } else {
                    format!(
                        "[{label}] TestRun Status: {} ({}/{})  -- {detail}",
                        self.state, counts.tests_completed, counts.tests_total
                    )
                }
            }
            (Some(detail), None) => {
                format!("[{label}] Request Status: {}  -- {detail}", self.state)
            }
            (None, _) => format!("[{label}] Request Status: {}", self.state),
        }
    }
}
