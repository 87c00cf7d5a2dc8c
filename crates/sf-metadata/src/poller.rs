//! Job submission and status polling.
//!
//! A job is submitted once, then its status is checked until the server
//! reports it done. Errors while polling never escape: they become a
//! terminal `Failed` status carrying the error text, so every job ends in
//! a [`Report`].

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use tracing::{debug, info, instrument, warn};

use crate::client::MetadataClient;
use crate::deploy::{deploy_params, DeployOptions};
use crate::envelope::{Operation, Params};
use crate::error::{Error, ErrorKind, Result};
use crate::job::{JobState, JobStatus};
use crate::report::{FailureKind, Report, ReportBuilder};
use crate::retrieve::RetrieveRequest;
use crate::types::{AsyncJobHandle, OperationKind};

/// How long to wait between status checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay while the job is `Queued` or `Pending`.
    pub queued_delay: Duration,
    /// Delay in every other non-terminal state.
    pub running_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            queued_delay: Duration::from_secs(2),
            running_delay: Duration::from_secs(1),
        }
    }
}

impl PollPolicy {
    /// Poll again without waiting.
    pub fn immediate() -> Self {
        Self {
            queued_delay: Duration::ZERO,
            running_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, state: JobState) -> Duration {
        match state {
            JobState::Queued | JobState::Pending => self.queued_delay,
            _ => self.running_delay,
        }
    }
}

impl MetadataClient {
    /// Submit a retrieve job.
    pub async fn submit_retrieve(&self, request: &RetrieveRequest) -> Result<AsyncJobHandle> {
        self.submit(Operation::Retrieve, &request.to_params(), OperationKind::Retrieve)
            .await
    }

    /// Submit a deploy job for a zip archive.
    ///
    /// A check-only deploy is tracked as a validation.
    pub async fn submit_deploy(
        &self,
        zip: &[u8],
        options: &DeployOptions,
    ) -> Result<AsyncJobHandle> {
        self.submit_deploy_base64(general_purpose::STANDARD.encode(zip), options)
            .await
    }

    /// Submit a deploy job for an already encoded zip archive.
    pub async fn submit_deploy_base64(
        &self,
        zip_base64: String,
        options: &DeployOptions,
    ) -> Result<AsyncJobHandle> {
        let kind = if options.check_only {
            OperationKind::Validate
        } else {
            OperationKind::Deploy
        };
        self.submit(Operation::Deploy, &deploy_params(zip_base64, options), kind)
            .await
    }

    /// Quick-deploy a validation that already ran its tests.
    pub async fn submit_recent_validation(&self, validation_id: &str) -> Result<AsyncJobHandle> {
        let params = Params::new().with("validationId", validation_id);
        self.submit(Operation::DeployRecentValidation, &params, OperationKind::Deploy)
            .await
    }

    #[instrument(skip(self, params), fields(operation = %operation))]
    async fn submit(
        &self,
        operation: Operation,
        params: &Params,
        kind: OperationKind,
    ) -> Result<AsyncJobHandle> {
        let label = kind.label();
        self.progress
            .line(&format!("[{label}] Start request for a {label}..."));

        let envelope = self.invoke(operation, params).await?;
        let result = envelope.result(operation.name())?;
        // deployRecentValidation answers with the bare id
        let id = result
            .child_text("id")
            .or_else(|| result.text())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::new(ErrorKind::InvalidResponse(format!(
                    "No async process ID in {operation} response"
                )))
            })?;

        info!(job_id = id, kind = label, "Job submitted");
        self.progress
            .line(&format!("[{label}] Request for a {label} submitted successfully."));
        Ok(AsyncJobHandle::new(id, kind))
    }

    /// Check the job's status until it is done, handing every snapshot to
    /// `observer`, and return the last one.
    ///
    /// The session is fetched once; an expired session ends polling with a
    /// failed status instead of logging in again.
    pub async fn poll_until_terminal<F>(&self, handle: &AsyncJobHandle, mut observer: F) -> JobStatus
    where
        F: FnMut(&JobStatus),
    {
        let session = match self.sessions().login(false).await {
            Ok(session) => session,
            Err(err) => {
                warn!(job_id = handle.id(), error = %err, "No session for polling");
                let status = JobStatus::poll_failure(handle.id(), Error::from(err));
                observer(&status);
                return status;
            }
        };

        let (operation, params) = status_request(handle);
        let mut polls = 0u32;
        loop {
            polls += 1;
            let status = match self.call(&session, operation, &params).await {
                Ok(envelope) => JobStatus::from_envelope(&envelope, operation.name())
                    .map_err(Error::from),
                Err(err) => Err(err),
            };

            let status = status.unwrap_or_else(|err| {
                warn!(job_id = handle.id(), polls, error = %err, "Polling failed");
                JobStatus::poll_failure(handle.id(), err)
            });

            debug!(job_id = handle.id(), polls, state = %status.state, done = status.done, "Polled job");
            observer(&status);

            if status.done {
                return status;
            }
            tokio::time::sleep(self.poll_policy.delay_for(status.state)).await;
        }
    }

    /// Poll a submitted job to the end, streaming progress, and build its
    /// report.
    pub async fn wait_for(&self, handle: AsyncJobHandle) -> Report {
        let label = handle.kind().label();
        self.progress.line(&format!(
            "[{label}] Request ID for the current {label} task: {}",
            handle.id()
        ));
        self.progress.line(&format!(
            "[{label}] Waiting for server to finish processing the request..."
        ));

        let progress = self.progress.clone();
        let mut builder = ReportBuilder::new(handle.clone());
        let final_status = self
            .poll_until_terminal(&handle, |status| {
                progress.line(&status.progress_line(label));
                for failure in builder.observe(status) {
                    let heading = match failure.kind {
                        FailureKind::Component => "Component Failure",
                        FailureKind::Test => "Test Failure",
                    };
                    progress.line(&format!(
                        "[{label}] {heading}: {} -- {}",
                        failure.subject, failure.message
                    ));
                }
            })
            .await;

        let report = builder.finish(&final_status);
        info!(
            job_id = %report.job_id,
            outcome = ?report.outcome,
            failures = report.failures.len(),
            "Job finished"
        );
        for line in report.lines() {
            self.progress.line(&line);
        }
        report
    }
}

fn status_request(handle: &AsyncJobHandle) -> (Operation, Params) {
    match handle.kind() {
        OperationKind::Retrieve => (
            Operation::CheckRetrieveStatus,
            Params::new()
                .with("asyncProcessId", handle.id())
                .with("includeZip", true),
        ),
        OperationKind::Deploy | OperationKind::Validate => (
            Operation::CheckDeployStatus,
            Params::new()
                .with("asyncProcessId", handle.id())
                .with("includeDetails", true),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays() {
        let policy = PollPolicy::default();
        assert_eq!(policy.delay_for(JobState::Queued), Duration::from_secs(2));
        assert_eq!(policy.delay_for(JobState::Pending), Duration::from_secs(2));
        assert_eq!(policy.delay_for(JobState::InProgress), Duration::from_secs(1));
        assert_eq!(policy.delay_for(JobState::Canceling), Duration::from_secs(1));
    }

    #[test]
    fn test_immediate_policy() {
        let policy = PollPolicy::immediate();
        assert_eq!(policy.delay_for(JobState::Queued), Duration::ZERO);
        assert_eq!(policy.delay_for(JobState::InProgress), Duration::ZERO);
    }

    #[test]
    fn test_status_request_by_kind() {
        let (op, params) = status_request(&AsyncJobHandle::new("09S1", OperationKind::Retrieve));
        assert_eq!(op, Operation::CheckRetrieveStatus);
        assert!(params.get("includeZip").is_some());

        let (op, params) = status_request(&AsyncJobHandle::new("0Af1", OperationKind::Validate));
        assert_eq!(op, Operation::CheckDeployStatus);
        assert!(params.get("includeDetails").is_some());
    }
}
