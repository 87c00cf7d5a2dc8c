//! Username/password login through the SOAP partner API.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use sforge_client::security::xml;
use sforge_client::soap::Envelope;
use sforge_client::{SoapRequest, Transport, DEFAULT_API_VERSION};
use tracing::{debug, instrument};

use crate::error::{Error, ErrorKind, Result};
use crate::session::Session;
use crate::PRODUCTION_LOGIN_URL;

/// Produces fresh sessions.
///
/// [`crate::SessionManager`] calls this whenever no usable session is held.
pub trait Authenticator: Send + Sync {
    /// Perform a full login.
    fn authenticate(&self) -> BoxFuture<'_, Result<Session>>;

    /// Key used to cache the resulting session, usually the username.
    fn cache_key(&self) -> String;
}

/// Partner API `login` call with username, password and security token.
///
/// The password and security token are redacted in Debug output.
#[derive(Clone)]
pub struct SoapLogin {
    transport: Arc<dyn Transport>,
    login_url: String,
    api_version: String,
    username: String,
    password: String,
    security_token: Option<String>,
}

impl std::fmt::Debug for SoapLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapLogin")
            .field("login_url", &self.login_url)
            .field("api_version", &self.api_version)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field(
                "security_token",
                &self.security_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl SoapLogin {
    pub fn new(
        transport: Arc<dyn Transport>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            login_url: PRODUCTION_LOGIN_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            username: username.into(),
            password: password.into(),
            security_token: None,
        }
    }

    /// Login endpoint host, e.g. the sandbox URL.
    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = login_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Appended to the password, as the partner API expects.
    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = Some(token.into());
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn endpoint(&self) -> String {
        format!("{}/services/Soap/u/{}", self.login_url, self.api_version)
    }

    fn envelope(&self) -> String {
        let password = format!(
            "{}{}",
            self.password,
            self.security_token.as_deref().unwrap_or_default()
        );
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:urn="urn:partner.soap.sforce.com">
  <soapenv:Body>
    <urn:login>
      <urn:username>{}</urn:username>
      <urn:password>{}</urn:password>
    </urn:login>
  </soapenv:Body>
</soapenv:Envelope>"#,
            xml::escape(&self.username),
            xml::escape(&password),
        )
    }

    #[instrument(skip(self), fields(username = %self.username))]
    async fn login(&self) -> Result<Session> {
        let request = SoapRequest::new(self.endpoint(), "login", self.envelope());
        let response = self.transport.send(request).await?;
        debug!(status = response.status, "Login response received");

        let envelope = Envelope::decode(&response.body)?;
        if let Some(fault) = envelope.fault() {
            return Err(Error::new(ErrorKind::Login {
                code: fault.fault_code,
                message: fault.fault_string,
            }));
        }
        if !response.is_success() {
            return Err(Error::new(ErrorKind::Transport(format!(
                "HTTP {} from login endpoint",
                response.status
            ))));
        }

        let result = envelope.result("login")?;
        let session_id = result.child_text("sessionId").ok_or_else(|| {
            Error::new(ErrorKind::InvalidResponse(
                "login result has no sessionId".to_string(),
            ))
        })?;
        let server_url = result.child_text("serverUrl").ok_or_else(|| {
            Error::new(ErrorKind::InvalidResponse(
                "login result has no serverUrl".to_string(),
            ))
        })?;

        let instance_url = url::Url::parse(server_url)?.origin().ascii_serialization();
        let mut session = Session::new(instance_url, session_id);
        if let Some(user_id) = result.child_text("userId") {
            session = session.with_user_id(user_id);
        }
        Ok(session)
    }
}

impl Authenticator for SoapLogin {
    fn authenticate(&self) -> BoxFuture<'_, Result<Session>> {
        self.login().boxed()
    }

    fn cache_key(&self) -> String {
        self.username.clone()
    }
}
