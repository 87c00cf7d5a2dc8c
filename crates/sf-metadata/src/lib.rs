//! # sforge-metadata
//!
//! Salesforce Metadata API job orchestration.
//!
//! ## Features
//!
//! - **Envelopes** - Build SOAP requests from typed parameters, escaping every value
//! - **Retrieve and Deploy** - Submit long-running jobs and poll them to completion
//! - **Session Renewal** - Log in again once when the server reports an expired session
//! - **Reports** - Deduplicated component and test failures, warnings and a printable summary
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use sforge_auth::{SessionManager, SoapLogin};
//! use sforge_client::HttpTransport;
//! use sforge_metadata::{MetadataClient, PackageManifest, RetrieveRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(HttpTransport::default_transport()?);
//!     let login = SoapLogin::new(transport.clone(), "user@example.com", "password");
//!     let client = MetadataClient::new(Arc::new(SessionManager::new(login)), transport);
//!
//!     let manifest = PackageManifest::new("62.0").add_type("ApexClass", vec!["*".to_string()]);
//!     let report = client.retrieve(&RetrieveRequest::unpackaged(manifest)).await?;
//!
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

mod client;
mod deploy;
mod envelope;
mod error;
mod job;
mod poller;
mod progress;
mod report;
mod retrieve;
mod types;

pub use client::MetadataClient;
pub use deploy::{DeployOptions, TestLevel};
pub use envelope::{EnvelopeBuilder, Operation, ParamValue, Params, TemplateError};
pub use error::{Error, ErrorKind, Result};
pub use job::{JobState, JobStatus, ProgressCounts, RetrieveMessage};
pub use poller::PollPolicy;
pub use progress::{ProgressSink, TracingProgress};
pub use report::{FailureKind, FailureRecord, Outcome, Report, ReportBuilder};
pub use retrieve::{PackageManifest, PackageTypeMembers, RetrieveRequest};
pub use types::{AsyncJobHandle, CancelDeployResult, MetadataError, OperationKind, SaveResult};
