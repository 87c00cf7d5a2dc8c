//! # sforge-auth
//!
//! Session handling for Metadata API calls.
//!
//! ## Security
//!
//! - Session ids, passwords and tokens are redacted in Debug output
//! - Tracing skips credential parameters
//! - Cached sessions are written with owner-only permissions on Unix
//!
//! ## Login methods
//!
//! - **SOAP partner login** ([`SoapLogin`]) - username, password and security token
//! - **OAuth 2.0 refresh token** ([`RefreshTokenLogin`]) - connected app grant
//!
//! ## Session expiry
//!
//! The Metadata API signals an expired session only through the
//! `INVALID_SESSION_ID` marker in a response body. [`SessionManager::with_session`]
//! re-authenticates once and replays the operation when it sees that marker.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sforge_auth::{SessionManager, SoapLogin};
//! use sforge_client::HttpTransport;
//!
//! let transport = Arc::new(HttpTransport::default_transport()?);
//! let login = SoapLogin::new(transport, "user@example.com", "password")
//!     .with_security_token("token");
//! let sessions = SessionManager::new(login);
//!
//! let session = sessions.login(false).await?;
//! println!("Logged in to {}", session.instance_url());
//! ```

mod error;
mod login;
mod oauth;
mod session;
mod storage;

pub use error::{Error, ErrorKind, Result};
pub use login::{Authenticator, SoapLogin};
pub use oauth::{OAuthConfig, RefreshTokenLogin, TokenResponse};
pub use session::{is_session_expired, Session, SessionFault, SessionManager, INVALID_SESSION_MARKER};
pub use storage::{default_session_dir, FileSessionStore, SessionStore};

/// Default login URL for production orgs.
pub const PRODUCTION_LOGIN_URL: &str = "https://login.salesforce.com";

/// Default login URL for sandboxes.
pub const SANDBOX_LOGIN_URL: &str = "https://test.salesforce.com";
