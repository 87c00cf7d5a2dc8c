//! Common types for Metadata API jobs.

use serde::{Deserialize, Serialize};
use sforge_client::soap::{DecodeError, Node};

/// Kind of long-running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Retrieve,
    Deploy,
    /// A check-only deploy.
    Validate,
}

impl OperationKind {
    /// Lowercase label used in progress lines.
    pub fn label(self) -> &'static str {
        match self {
            OperationKind::Retrieve => "retrieve",
            OperationKind::Deploy => "deploy",
            OperationKind::Validate => "validate",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Handle for a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AsyncJobHandle {
    async_process_id: String,
    kind: OperationKind,
}

impl AsyncJobHandle {
    pub fn new(async_process_id: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            async_process_id: async_process_id.into(),
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.async_process_id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }
}

/// Result of `cancelDeploy`.
///
/// Canceling is asynchronous: poll the deploy to see it reach `Canceled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelDeployResult {
    pub id: String,
    pub done: bool,
}

impl CancelDeployResult {
    pub(crate) fn from_node(result: &Node) -> Result<Self, DecodeError> {
        let id = result
            .child_text("id")
            .ok_or_else(|| DecodeError::MissingKey {
                path: "Envelope/Body/cancelDeployResponse/result/id".to_string(),
            })?;
        Ok(Self {
            id: id.to_string(),
            done: result.flag("done"),
        })
    }
}

/// Error attached to a [`SaveResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataError {
    pub status_code: String,
    pub message: String,
    pub fields: Vec<String>,
}

/// Result of `renameMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResult {
    pub full_name: String,
    pub success: bool,
    pub errors: Vec<MetadataError>,
}

impl SaveResult {
    pub(crate) fn from_node(result: &Node) -> Self {
        let errors = result
            .all("errors")
            .iter()
            .map(|error| MetadataError {
                status_code: error.child_text("statusCode").unwrap_or_default().to_string(),
                message: error.child_text("message").unwrap_or_default().to_string(),
                fields: error
                    .all("fields")
                    .iter()
                    .filter_map(Node::text)
                    .map(str::to_string)
                    .collect(),
            })
            .collect();

        Self {
            full_name: result.child_text("fullName").unwrap_or_default().to_string(),
            success: result.flag("success"),
            errors,
        }
    }
}
