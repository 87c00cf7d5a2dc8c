//! Authenticated sessions and the manager that owns them.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::login::Authenticator;
use crate::storage::SessionStore;

/// Marker the Metadata API puts in a response body when the session id is
/// no longer valid. There is no structured error code for this condition.
pub const INVALID_SESSION_MARKER: &str = "INVALID_SESSION_ID";

/// Returns true if a raw response body signals an expired session.
pub fn is_session_expired(body: &str) -> bool {
    body.contains(INVALID_SESSION_MARKER)
}

/// An authenticated session against one org.
///
/// The session id is redacted in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    instance_url: String,
    session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("instance_url", &self.instance_url)
            .field("session_id", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl Session {
    pub fn new(instance_url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            session_id: session_id.into(),
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Base URL of the org, without a trailing slash.
    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

/// Errors that can tell whether they were caused by an expired session.
pub trait SessionFault {
    fn is_session_expired(&self) -> bool;
}

impl SessionFault for Error {
    fn is_session_expired(&self) -> bool {
        false
    }
}

/// Owns the current session and re-authenticates on demand.
///
/// Logins are serialized: concurrent callers wait on the same lock, so at
/// most one authentication is in flight per manager.
pub struct SessionManager {
    authenticator: Box<dyn Authenticator>,
    store: Option<Box<dyn SessionStore>>,
    current: Mutex<Option<Session>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("cache_key", &self.authenticator.cache_key())
            .field("has_store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager that logs in with the given authenticator.
    pub fn new(authenticator: impl Authenticator + 'static) -> Self {
        Self {
            authenticator: Box::new(authenticator),
            store: None,
            current: Mutex::new(None),
        }
    }

    /// Persist sessions in `store` so they survive restarts.
    pub fn with_store(mut self, store: impl SessionStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Start from an already known session.
    pub fn with_session_seed(self, session: Session) -> Self {
        Self {
            current: Mutex::new(Some(session)),
            ..self
        }
    }

    /// The session currently held, if any.
    pub async fn current(&self) -> Option<Session> {
        self.current.lock().await.clone()
    }

    /// Log in, reusing the held or cached session unless `force_relogin` is set.
    ///
    /// Use `force_relogin` after the remote side reported the session as
    /// expired; the fresh session replaces the held and cached ones.
    pub async fn login(&self, force_relogin: bool) -> Result<Session> {
        let mut current = self.current.lock().await;

        if !force_relogin {
            if let Some(session) = current.as_ref() {
                return Ok(session.clone());
            }
            if let Some(session) = self.load_cached() {
                debug!(instance_url = %session.instance_url(), "Using cached session");
                *current = Some(session.clone());
                return Ok(session);
            }
        }

        let session = self.authenticator.authenticate().await?;
        info!(
            instance_url = %session.instance_url(),
            forced = force_relogin,
            "Logged in"
        );

        self.save_cached(&session);
        *current = Some(session.clone());
        Ok(session)
    }

    /// Run `operation` with a valid session.
    ///
    /// If the operation fails because the session expired, this logs in
    /// again exactly once and replays it. A second expiry is returned to
    /// the caller as is.
    pub async fn with_session<T, E, F, Fut>(&self, mut operation: F) -> std::result::Result<T, E>
    where
        F: FnMut(Session) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: SessionFault + From<Error>,
    {
        let session = self.login(false).await?;
        match operation(session).await {
            Err(err) if err.is_session_expired() => {
                warn!("Session expired, logging in again");
                let session = self.login(true).await?;
                operation(session).await
            }
            result => result,
        }
    }

    fn load_cached(&self) -> Option<Session> {
        let store = self.store.as_ref()?;
        match store.load(&self.authenticator.cache_key()) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "Failed to read cached session");
                None
            }
        }
    }

    fn save_cached(&self, session: &Session) {
        if let Some(store) = &self.store {
            if let Err(err) = store.save(&self.authenticator.cache_key(), session) {
                warn!(error = %err, "Failed to cache session");
            }
        }
    }
}
