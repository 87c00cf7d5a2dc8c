//! Aggregation of job snapshots into a final report.
//!
//! The service echoes the full failure list on every poll, so the same
//! failure shows up again and again. [`ReportBuilder`] keeps the first
//! sighting of each failure identity and drops the repeats.
//!
//! Every list in the result (`componentFailures`, `failures`,
//! `codeCoverageWarnings`, `messages`) is read through
//! [`Node::all`], which yields the same slice shape whether the element
//! occurred once or many times.

use std::collections::HashSet;

use sforge_client::soap::Node;

use crate::job::{JobState, JobStatus, ProgressCounts};
use crate::types::{AsyncJobHandle, OperationKind};

/// Origin of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Component,
    Test,
}

/// A single component or test failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub kind: FailureKind,
    /// Dedup key, unique per kind.
    pub identity: String,
    /// File name for components, `Class.method` for tests.
    pub subject: String,
    pub message: String,
    /// Stack trace of a test failure.
    pub detail: Option<String>,
}

impl FailureRecord {
    fn component(item: &Node) -> Self {
        let text = |key: &str| item.child_text(key).unwrap_or_default().to_string();
        let file_name = text("fileName");
        let line = item.child_text("lineNumber").unwrap_or("0");
        let column = item.child_text("columnNumber").unwrap_or("0");
        let problem = text("problem");

        let anchor = item
            .child_text("id")
            .filter(|id| !id.is_empty())
            .unwrap_or(&file_name);
        let identity = format!("{anchor}:{line}:{column}:{problem}");

        let message = match item.child_text("problemType") {
            Some(problem_type) => {
                format!("{problem_type}: {problem} (line {line} column {column})")
            }
            None => format!("{problem} (line {line} column {column})"),
        };

        Self {
            kind: FailureKind::Component,
            identity,
            subject: file_name,
            message,
            detail: None,
        }
    }

    fn test(item: &Node) -> Self {
        let name = item.child_text("name").unwrap_or_default();
        let method = item.child_text("methodName").unwrap_or_default();
        let subject = if method.is_empty() {
            name.to_string()
        } else {
            format!("{name}.{method}")
        };

        let identity = item
            .child_text("id")
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| subject.clone());

        Self {
            kind: FailureKind::Test,
            identity,
            subject,
            message: item.child_text("message").unwrap_or_default().to_string(),
            // Compile errors in tests come without a stack trace
            detail: item
                .get("stackTrace")
                .filter(|trace| trace.is_plain_text())
                .and_then(Node::text)
                .map(str::to_string),
        }
    }
}

/// Final outcome of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Succeeded,
    Failed,
    Canceled,
}

impl Outcome {
    fn from_state(state: JobState) -> Self {
        match state {
            JobState::Failed => Outcome::Failed,
            JobState::Canceled => Outcome::Canceled,
            _ => Outcome::Succeeded,
        }
    }
}

/// Accumulates failures and warnings across polls.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    handle: AsyncJobHandle,
    failures: Vec<FailureRecord>,
    seen_failures: HashSet<(FailureKind, String)>,
    warnings: Vec<String>,
    seen_warnings: HashSet<String>,
}

impl ReportBuilder {
    pub fn new(handle: AsyncJobHandle) -> Self {
        Self {
            handle,
            failures: Vec::new(),
            seen_failures: HashSet::new(),
            warnings: Vec::new(),
            seen_warnings: HashSet::new(),
        }
    }

    /// Record what `status` reports and return failures not seen before.
    pub fn observe(&mut self, status: &JobStatus) -> Vec<FailureRecord> {
        let mut fresh = Vec::new();

        if let Some(detail) = &status.detail {
            for item in detail.all("componentFailures") {
                self.record(FailureRecord::component(item), &mut fresh);
            }

            if let Some(run) = detail.get("runTestResult") {
                for item in run.all("failures") {
                    self.record(FailureRecord::test(item), &mut fresh);
                }

                for warning in run.all("codeCoverageWarnings") {
                    let Some(name) = warning.get("name").filter(|n| n.is_plain_text()) else {
                        continue;
                    };
                    let message = warning.child_text("message").unwrap_or_default();
                    self.warn(format!("{} -- {}", name.text().unwrap_or_default(), message));
                }
            }
        }

        for message in &status.messages {
            self.warn(format!("{} - {}", message.file_name, message.problem));
        }

        fresh
    }

    /// Observe the terminal status and build the report.
    pub fn finish(mut self, final_status: &JobStatus) -> Report {
        self.observe(final_status);

        Report {
            job_id: self.handle.id().to_string(),
            kind: self.handle.kind(),
            outcome: Outcome::from_state(final_status.state),
            final_state: final_status.state,
            failures: self.failures,
            warnings: self.warnings,
            error_message: final_status.error_message.clone(),
            zip_file: final_status.zip_file.clone(),
            debug_log: final_status.debug_log.clone(),
            counts: final_status.progress,
        }
    }

    fn record(&mut self, failure: FailureRecord, fresh: &mut Vec<FailureRecord>) {
        if self
            .seen_failures
            .insert((failure.kind, failure.identity.clone()))
        {
            fresh.push(failure.clone());
            self.failures.push(failure);
        }
    }

    fn warn(&mut self, warning: String) {
        if self.seen_warnings.insert(warning.clone()) {
            self.warnings.push(warning);
        }
    }
}

/// Final, immutable result of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub job_id: String,
    pub kind: OperationKind,
    pub outcome: Outcome,
    pub final_state: JobState,
    /// In encounter order.
    pub failures: Vec<FailureRecord>,
    /// In encounter order, without duplicates.
    pub warnings: Vec<String>,
    pub error_message: Option<String>,
    pub zip_file: Option<String>,
    pub debug_log: Option<String>,
    pub counts: Option<ProgressCounts>,
}

impl Report {
    /// Build a report from every snapshot seen, oldest first.
    ///
    /// Returns `None` for an empty sequence.
    pub fn from_snapshots(handle: &AsyncJobHandle, snapshots: &[JobStatus]) -> Option<Report> {
        let (last, earlier) = snapshots.split_last()?;
        let mut builder = ReportBuilder::new(handle.clone());
        for status in earlier {
            builder.observe(status);
        }
        Some(builder.finish(last))
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }

    pub fn component_failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.failures
            .iter()
            .filter(|f| f.kind == FailureKind::Component)
    }

    pub fn test_failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.failures.iter().filter(|f| f.kind == FailureKind::Test)
    }

    /// Short outcome text.
    pub fn summary(&self) -> String {
        match self.outcome {
            Outcome::Succeeded => "build successful".to_string(),
            Outcome::Failed => format!(
                "build failed with {} component failures",
                self.component_failures().count()
            ),
            Outcome::Canceled => "canceled".to_string(),
        }
    }

    /// The rendered report, one entry per line.
    pub fn lines(&self) -> Vec<String> {
        let label = self.kind.label();
        let banner = |word: &str| {
            format!(
                "*********** {} {} ***********",
                label.to_uppercase(),
                word
            )
        };
        let mut lines = Vec::new();

        match self.outcome {
            Outcome::Succeeded => {
                lines.push(format!("[{label}] Request Succeeded"));
                lines.push(banner("SUCCEEDED"));
                lines.push(format!("Request ID: {}", self.job_id));
                self.push_warnings(&mut lines);
                lines.push(String::new());
                lines.push("BUILD SUCCESSFUL".to_string());
            }
            Outcome::Canceled => {
                lines.push("BUILD FAILED".to_string());
                lines.push(banner("FAILED"));
                lines.push(format!("Request ID: {}", self.job_id));
                lines.push(String::new());
                lines.push("Request Canceled".to_string());
                lines.push(banner("FAILED"));
            }
            Outcome::Failed => {
                lines.push("BUILD FAILED".to_string());
                lines.push(banner("FAILED"));
                lines.push(format!("Request ID: {}", self.job_id));

                let components: Vec<_> = self.component_failures().collect();
                if components.is_empty() {
                    if let Some(message) = &self.error_message {
                        lines.push(String::new());
                        lines.push(message.clone());
                    }
                } else {
                    lines.push(String::new());
                    lines.push("All Component Failures:".to_string());
                    for (index, failure) in components.iter().enumerate() {
                        lines.push(format!(
                            "{}. {} -- {}",
                            index + 1,
                            failure.subject,
                            failure.message
                        ));
                    }
                }

                let tests: Vec<_> = self.test_failures().collect();
                if !tests.is_empty() {
                    lines.push(String::new());
                    lines.push("Test Failures:".to_string());
                    for (index, failure) in tests.iter().enumerate() {
                        lines.push(format!(
                            "{}. {} -- {}",
                            index + 1,
                            failure.subject,
                            failure.message
                        ));
                        if let Some(trace) = &failure.detail {
                            lines.extend(trace.lines().map(|l| format!("    {}", l.trim_end())));
                        }
                    }
                }

                self.push_warnings(&mut lines);
                lines.push(banner("FAILED"));
            }
        }

        lines
    }

    fn push_warnings(&self, lines: &mut Vec<String>) {
        if self.warnings.is_empty() {
            return;
        }
        lines.push(String::new());
        lines.push("Warnings:".to_string());
        lines.extend(self.warnings.iter().cloned());
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> AsyncJobHandle {
        AsyncJobHandle::new("0Af000000000001", OperationKind::Deploy)
    }

    fn status(state: JobState, detail: Option<Node>) -> JobStatus {
        let mut status = JobStatus::poll_failure("0Af000000000001", "");
        status.state = state;
        status.done = state.is_terminal();
        status.error_message = None;
        status.poll_error = None;
        status.detail = detail;
        status
    }

    fn component_failure(id: &str, file: &str, line: &str, problem: &str) -> Node {
        Node::default()
            .with_child("id", Node::leaf(id))
            .with_child("fileName", Node::leaf(file))
            .with_child("lineNumber", Node::leaf(line))
            .with_child("columnNumber", Node::leaf("5"))
            .with_child("problemType", Node::leaf("Error"))
            .with_child("problem", Node::leaf(problem))
    }

    fn test_failure(id: &str, method: &str) -> Node {
        Node::default()
            .with_child("id", Node::leaf(id))
            .with_child("name", Node::leaf("FooTest"))
            .with_child("methodName", Node::leaf(method))
            .with_child("message", Node::leaf("System.AssertException: Assertion Failed"))
            .with_child(
                "stackTrace",
                Node::leaf("Class.FooTest.testA: line 4, column 1\nClass.Foo.run: line 9, column 1"),
            )
    }

    #[test]
    fn test_single_failure_same_as_one_element_list() {
        // A lone componentFailures element and a list of one decode to the same shape
        let single = Node::default().with_child(
            "componentFailures",
            component_failure("01p1", "classes/Foo.cls", "3", "Unexpected token"),
        );

        let mut builder = ReportBuilder::new(handle());
        let fresh = builder.observe(&status(JobState::InProgress, Some(single)));
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].subject, "classes/Foo.cls");
        assert_eq!(
            fresh[0].message,
            "Error: Unexpected token (line 3 column 5)"
        );
    }

    #[test]
    fn test_repeated_polls_are_deduplicated() {
        let detail = Node::default()
            .with_child(
                "componentFailures",
                component_failure("01p1", "classes/Foo.cls", "3", "Unexpected token"),
            )
            .with_child(
                "componentFailures",
                component_failure("01p1", "classes/Foo.cls", "7", "Variable does not exist: x"),
            );

        let mut builder = ReportBuilder::new(handle());
        assert_eq!(
            builder
                .observe(&status(JobState::InProgress, Some(detail.clone())))
                .len(),
            2
        );
        assert!(builder
            .observe(&status(JobState::InProgress, Some(detail.clone())))
            .is_empty());

        let report = builder.finish(&status(JobState::Failed, Some(detail)));
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.summary(), "build failed with 2 component failures");
    }

    #[test]
    fn test_test_failure_identity_falls_back_to_method() {
        let detail = Node::default().with_child(
            "runTestResult",
            Node::default()
                .with_child("failures", test_failure("", "testA"))
                .with_child("failures", test_failure("", "testA"))
                .with_child("failures", test_failure("", "testB")),
        );

        let mut builder = ReportBuilder::new(handle());
        let fresh = builder.observe(&status(JobState::InProgress, Some(detail)));
        let identities: Vec<_> = fresh.iter().map(|f| f.identity.as_str()).collect();
        assert_eq!(identities, vec!["FooTest.testA", "FooTest.testB"]);
    }

    #[test]
    fn test_coverage_warnings_need_plain_name() {
        let detail = Node::default().with_child(
            "runTestResult",
            Node::default()
                .with_child(
                    "codeCoverageWarnings",
                    Node::default()
                        .with_child("name", Node::leaf("Foo"))
                        .with_child("message", Node::leaf("Test coverage of selected Apex Class is 50%")),
                )
                .with_child(
                    "codeCoverageWarnings",
                    Node::default()
                        .with_child(
                            "name",
                            Node::default().with_child("nil", Node::leaf("true")),
                        )
                        .with_child("message", Node::leaf("Average test coverage is 60%")),
                )
                .with_child(
                    "codeCoverageWarnings",
                    Node::default()
                        .with_child("name", Node::leaf("Foo"))
                        .with_child("message", Node::leaf("Test coverage of selected Apex Class is 50%")),
                ),
        );

        let report = Report::from_snapshots(&handle(), &[status(JobState::Failed, Some(detail))])
            .unwrap();
        assert_eq!(
            report.warnings,
            vec!["Foo -- Test coverage of selected Apex Class is 50%"]
        );
    }

    #[test]
    fn test_canceled_report() {
        let report =
            Report::from_snapshots(&handle(), &[status(JobState::Canceling, None), status(JobState::Canceled, None)])
                .unwrap();

        assert_eq!(report.outcome, Outcome::Canceled);
        assert!(report.failures.is_empty());
        assert_eq!(report.summary(), "canceled");
        assert!(report.lines().contains(&"Request Canceled".to_string()));
    }

    #[test]
    fn test_succeeded_partial_counts_as_success() {
        let report =
            Report::from_snapshots(&handle(), &[status(JobState::SucceededPartial, None)]).unwrap();
        assert!(report.is_success());
        assert_eq!(report.summary(), "build successful");
    }

    #[test]
    fn test_empty_snapshots() {
        assert!(Report::from_snapshots(&handle(), &[]).is_none());
    }

    #[test]
    fn test_failed_report_rendering() {
        let detail = Node::default()
            .with_child(
                "componentFailures",
                component_failure("", "classes/Foo.cls", "3", "Unexpected token"),
            )
            .with_child(
                "runTestResult",
                Node::default()
                    .with_child("failures", test_failure("01p2", "testA"))
                    .with_child(
                        "codeCoverageWarnings",
                        Node::default()
                            .with_child("name", Node::leaf("Foo"))
                            .with_child("message", Node::leaf("No coverage")),
                    ),
            );

        let report =
            Report::from_snapshots(&handle(), &[status(JobState::Failed, Some(detail))]).unwrap();

        let expected = "\
BUILD FAILED
*********** DEPLOY FAILED ***********
Request ID: 0Af000000000001

All Component Failures:
1. classes/Foo.cls -- Error: Unexpected token (line 3 column 5)

Test Failures:
1. FooTest.testA -- System.AssertException: Assertion Failed
    Class.FooTest.testA: line 4, column 1
    Class.Foo.run: line 9, column 1

Warnings:
Foo -- No coverage
*********** DEPLOY FAILED ***********";
        assert_eq!(report.to_string(), expected);
    }

    #[test]
    fn test_failed_without_components_shows_error_message() {
        let mut final_status = status(JobState::Failed, None);
        final_status.error_message = Some("INVALID_CROSS_REFERENCE_KEY: no package.xml".to_string());

        let report = Report::from_snapshots(&handle(), &[final_status]).unwrap();
        assert!(report
            .lines()
            .contains(&"INVALID_CROSS_REFERENCE_KEY: no package.xml".to_string()));
        assert_eq!(report.summary(), "build failed with 0 component failures");
    }

    #[test]
    fn test_retrieve_messages_become_warnings() {
        let retrieve = AsyncJobHandle::new("09S1", OperationKind::Retrieve);
        let mut final_status = status(JobState::Succeeded, None);
        final_status.messages = vec![crate::job::RetrieveMessage {
            file_name: "unpackaged/package.xml".to_string(),
            problem: "Entity cannot be found".to_string(),
        }];
        final_status.zip_file = Some("UEsDBA==".to_string());

        let report = Report::from_snapshots(&retrieve, &[final_status]).unwrap();
        assert_eq!(
            report.warnings,
            vec!["unpackaged/package.xml - Entity cannot be found"]
        );
        assert_eq!(report.zip_file.as_deref(), Some("UEsDBA=="));
        assert_eq!(
            report.lines(),
            vec![
                "[retrieve] Request Succeeded",
                "*********** RETRIEVE SUCCEEDED ***********",
                "Request ID: 09S1",
                "",
                "Warnings:",
                "unpackaged/package.xml - Entity cannot be found",
                "",
                "BUILD SUCCESSFUL",
            ]
        );
    }
}
