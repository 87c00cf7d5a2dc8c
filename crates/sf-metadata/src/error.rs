//! Error types for sforge-metadata.
//!
//! A remote job that fails or is canceled is not an error: it is reported
//! through [`crate::Report::outcome`]. Errors here mean the local side could
//! not talk to the service or understand its answer.

use sforge_auth::SessionFault;
use sforge_client::soap::DecodeError;

use crate::envelope::TemplateError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Network failure or timeout.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The response could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(DecodeError),
    /// A request envelope could not be built.
    #[error("Template error: {0}")]
    Template(TemplateError),
    /// The response carried the expired session marker.
    #[error("Session expired")]
    SessionExpired,
    #[error("SOAP fault: {code} - {message}")]
    SoapFault { code: String, message: String },
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("{0}")]
    Other(String),
}

impl SessionFault for Error {
    fn is_session_expired(&self) -> bool {
        matches!(self.kind, ErrorKind::SessionExpired)
    }
}

impl From<sforge_client::Error> for Error {
    fn from(err: sforge_client::Error) -> Self {
        Error::with_source(ErrorKind::Transport(err.to_string()), err)
    }
}

impl From<sforge_auth::Error> for Error {
    fn from(err: sforge_auth::Error) -> Self {
        Error::with_source(ErrorKind::Auth(err.to_string()), err)
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::new(ErrorKind::Decode(err))
    }
}

impl From<TemplateError> for Error {
    fn from(err: TemplateError) -> Self {
        Error::new(ErrorKind::Template(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io(err.to_string()), err)
    }
}
