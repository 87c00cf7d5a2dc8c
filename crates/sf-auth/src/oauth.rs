//! OAuth 2.0 refresh token login.
//!
//! Used when the org is authorized through a connected app instead of a
//! username and password. Each login exchanges the long-lived refresh token
//! for a new access token, which the Metadata API accepts as a session id.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sforge_client::ClientConfig;
use tracing::instrument;

use crate::error::{Error, ErrorKind, Result};
use crate::login::Authenticator;
use crate::session::Session;
use crate::PRODUCTION_LOGIN_URL;

/// OAuth 2.0 configuration for a connected app.
///
/// `consumer_secret` is redacted in Debug output.
#[derive(Clone)]
pub struct OAuthConfig {
    /// Consumer key (client_id).
    pub consumer_key: String,
    consumer_secret: Option<String>,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .finish()
    }
}

impl OAuthConfig {
    pub fn new(consumer_key: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.consumer_secret = Some(secret.into());
        self
    }
}

/// Refresh token grant against `{login_url}/services/oauth2/token`.
#[derive(Clone)]
pub struct RefreshTokenLogin {
    config: OAuthConfig,
    refresh_token: String,
    login_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl std::fmt::Debug for RefreshTokenLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenLogin")
            .field("config", &self.config)
            .field("refresh_token", &"[REDACTED]")
            .field("login_url", &self.login_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RefreshTokenLogin {
    pub fn new(config: OAuthConfig, refresh_token: impl Into<String>) -> Self {
        Self {
            config,
            refresh_token: refresh_token.into(),
            login_url: PRODUCTION_LOGIN_URL.to_string(),
            http_client: reqwest::Client::new(),
            timeout: ClientConfig::default().timeout,
        }
    }

    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = login_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use the timeouts and TLS settings of `config` for token requests.
    pub fn with_client_config(mut self, config: &ClientConfig) -> Result<Self> {
        self.http_client = config.http_client()?;
        self.timeout = config.timeout;
        Ok(self)
    }

    /// Exchange the refresh token for a new access token.
    #[instrument(skip(self), fields(login_url = %self.login_url))]
    pub async fn refresh(&self) -> Result<TokenResponse> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.config.consumer_key.as_str()),
        ];
        if let Some(ref secret) = self.config.consumer_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let body = serde_urlencoded::to_string(params)?;

        let response = self
            .http_client
            .post(format!("{}/services/oauth2/token", self.login_url))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: OAuthErrorResponse = response.json().await?;
            return Err(Error::new(ErrorKind::OAuth {
                error: error.error,
                description: error.error_description,
            }));
        }

        Ok(response.json().await?)
    }
}

impl Authenticator for RefreshTokenLogin {
    fn authenticate(&self) -> BoxFuture<'_, Result<Session>> {
        async move { Ok(self.refresh().await?.into_session()) }.boxed()
    }

    /// One key per org and user: several orgs may share a connected app,
    /// but never a refresh token.
    fn cache_key(&self) -> String {
        let host = url::Url::parse(&self.login_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.login_url.clone());
        let digest = Sha256::digest(self.refresh_token.as_bytes());
        let fingerprint: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
        format!("oauth-{host}-{}-{fingerprint}", self.config.consumer_key)
    }
}

/// Token response from the OAuth endpoint.
///
/// Tokens are redacted in Debug output.
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub instance_url: String,
    /// Identity URL, ending in the user id.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub issued_at: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("instance_url", &self.instance_url)
            .field("id", &self.id)
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

impl TokenResponse {
    /// Convert to a session. The user id is the last segment of the identity URL.
    pub fn into_session(self) -> Session {
        let user_id = self
            .id
            .as_deref()
            .and_then(|id| id.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string);

        let session = Session::new(self.instance_url, self.access_token);
        match user_id {
            Some(user_id) => session.with_user_id(user_id),
            None => session,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}
