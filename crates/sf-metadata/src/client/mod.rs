//! Metadata API client.

use std::sync::Arc;

use sforge_auth::{is_session_expired, Session, SessionManager};
use sforge_client::soap::{parse_document, Envelope, Node};
use sforge_client::{SoapRequest, SoapResponse, Transport, DEFAULT_API_VERSION};
use tracing::{debug, instrument, warn};

use crate::envelope::{EnvelopeBuilder, Operation, Params};
use crate::error::{Error, ErrorKind, Result};
use crate::poller::PollPolicy;
use crate::progress::{ProgressSink, TracingProgress};

mod deploy;
mod rename;
mod retrieve;

/// Metadata API client.
///
/// Every call runs through the shared [`SessionManager`]; one-shot calls
/// and job submissions log in again once if the session has expired.
#[derive(Clone)]
pub struct MetadataClient {
    sessions: Arc<SessionManager>,
    transport: Arc<dyn Transport>,
    api_version: String,
    pub(crate) poll_policy: PollPolicy,
    pub(crate) progress: Arc<dyn ProgressSink>,
    debug_categories: Vec<(String, String)>,
}

impl std::fmt::Debug for MetadataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataClient")
            .field("sessions", &self.sessions)
            .field("api_version", &self.api_version)
            .field("poll_policy", &self.poll_policy)
            .finish_non_exhaustive()
    }
}

impl MetadataClient {
    pub fn new(sessions: Arc<SessionManager>, transport: Arc<dyn Transport>) -> Self {
        Self {
            sessions,
            transport,
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_policy: PollPolicy::default(),
            progress: Arc::new(TracingProgress),
            debug_categories: Vec::new(),
        }
    }

    /// Set the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Send progress lines to `sink` instead of `tracing`.
    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Arc::new(sink);
        self
    }

    /// Request a debug log with every call, as `(category, level)` pairs.
    pub fn with_debug_categories(mut self, categories: Vec<(String, String)>) -> Self {
        self.debug_categories = categories;
        self
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Get the Metadata API SOAP endpoint URL.
    pub(crate) fn metadata_url(&self, session: &Session) -> String {
        format!(
            "{}/services/Soap/m/{}",
            session.instance_url(),
            self.api_version
        )
    }

    /// Post one operation with `session` and decode the envelope.
    ///
    /// The expired session marker is checked before anything else, so it
    /// wins over HTTP status and faults.
    #[instrument(skip(self, session, params), fields(operation = %operation))]
    pub(crate) async fn call(
        &self,
        session: &Session,
        operation: Operation,
        params: &Params,
    ) -> Result<Envelope> {
        let body = EnvelopeBuilder::new(session.session_id())
            .with_debug_categories(self.debug_categories.clone())
            .build(operation, params)?;

        let request = SoapRequest::new(self.metadata_url(session), operation.name(), body);
        let response = self.transport.send(request).await?;
        debug!(status = response.status, bytes = response.body.len(), "Metadata response");

        if is_session_expired(&response.body) {
            warn!("Response carries the expired session marker");
            return Err(Error::new(ErrorKind::SessionExpired));
        }

        if response.status > 399 {
            return Err(response_error(&response));
        }

        let envelope = Envelope::decode(&response.body)?;
        if let Some(fault) = envelope.fault() {
            return Err(Error::new(ErrorKind::SoapFault {
                code: fault.fault_code,
                message: fault.fault_string,
            }));
        }
        Ok(envelope)
    }

    /// [`MetadataClient::call`] with a valid session, logging in again once
    /// if it expired.
    pub(crate) async fn invoke(&self, operation: Operation, params: &Params) -> Result<Envelope> {
        self.sessions
            .with_session(move |session| async move {
                self.call(&session, operation, params).await
            })
            .await
    }
}

/// Error for an HTTP status above 399: the SOAP fault when there is one,
/// otherwise the first `message` element or the bare status.
fn response_error(response: &SoapResponse) -> Error {
    if let Some(fault) = Envelope::decode(&response.body)
        .ok()
        .and_then(|envelope| envelope.fault())
    {
        return Error::new(ErrorKind::SoapFault {
            code: fault.fault_code,
            message: fault.fault_string,
        });
    }

    let message = parse_document(&response.body)
        .ok()
        .and_then(|(_, root)| find_text(&root, "message").map(str::to_string))
        .unwrap_or_else(|| format!("HTTP status {}", response.status));

    Error::new(ErrorKind::Http {
        status: response.status,
        message,
    })
}

fn find_text<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    if let Some(text) = node.child_text(key) {
        return Some(text);
    }
    node.keys()
        .flat_map(|k| node.all(k))
        .find_map(|child| find_text(child, key))
}
