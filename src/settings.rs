//! Project settings: a JSON file overlaid with `SF_*` environment variables.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sforge_auth::{
    FileSessionStore, OAuthConfig, RefreshTokenLogin, SessionManager, SoapLogin,
    PRODUCTION_LOGIN_URL,
};
use sforge_client::{ClientConfig, HttpTransport, Transport, DEFAULT_API_VERSION};
use sforge_metadata::{DeployOptions, MetadataClient, PollPolicy};
use tracing::{debug, warn};

use crate::error::{Error, ErrorKind, Result};

/// Settings for one org connection.
///
/// Credentials can be left out of the file and supplied through the
/// environment instead.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_version: String,
    pub login_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub security_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub verify_tls: bool,
    pub timeout_secs: u64,
    pub deploy_options: DeployOptions,
    pub poll: PollSettings,
    /// Debug log levels by category, e.g. `"Apex_code": "Debug"`.
    pub debug_levels: BTreeMap<String, String>,
    /// Keep sessions on disk between runs.
    pub session_cache: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Settings")
            .field("api_version", &self.api_version)
            .field("login_url", &self.login_url)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("security_token", &redact(&self.security_token))
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("verify_tls", &self.verify_tls)
            .field("timeout_secs", &self.timeout_secs)
            .field("poll", &self.poll)
            .field("session_cache", &self.session_cache)
            .finish_non_exhaustive()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            login_url: PRODUCTION_LOGIN_URL.to_string(),
            username: None,
            password: None,
            security_token: None,
            client_id: None,
            client_secret: None,
            refresh_token: None,
            verify_tls: true,
            timeout_secs: 120,
            deploy_options: DeployOptions::default(),
            poll: PollSettings::default(),
            debug_levels: BTreeMap::new(),
            session_cache: true,
        }
    }
}

/// Poll delays in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub queued_delay_ms: u64,
    pub running_delay_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        let policy = PollPolicy::default();
        Self {
            queued_delay_ms: policy.queued_delay.as_millis() as u64,
            running_delay_ms: policy.running_delay.as_millis() as u64,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file, then apply the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut settings: Settings = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "Loaded settings");
        settings.apply_env();
        Ok(settings)
    }

    /// Overlay `SF_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    /// Overlay values from `lookup`, keyed by environment variable name.
    ///
    /// Recognized: `SF_API_VERSION`, `SF_LOGIN_URL`, `SF_USERNAME`,
    /// `SF_PASSWORD`, `SF_SECURITY_TOKEN`, `SF_CLIENT_ID`,
    /// `SF_CLIENT_SECRET`, `SF_REFRESH_TOKEN` and `SF_VERIFY_TLS`.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(v) = get("SF_API_VERSION") {
            self.api_version = v;
        }
        if let Some(v) = get("SF_LOGIN_URL") {
            self.login_url = v;
        }
        for (name, slot) in [
            ("SF_USERNAME", &mut self.username),
            ("SF_PASSWORD", &mut self.password),
            ("SF_SECURITY_TOKEN", &mut self.security_token),
            ("SF_CLIENT_ID", &mut self.client_id),
            ("SF_CLIENT_SECRET", &mut self.client_secret),
            ("SF_REFRESH_TOKEN", &mut self.refresh_token),
        ] {
            if let Some(v) = get(name) {
                *slot = Some(v);
            }
        }
        if let Some(v) = get("SF_VERIFY_TLS") {
            match v.to_ascii_lowercase().as_str() {
                "0" | "false" | "no" => self.verify_tls = false,
                "1" | "true" | "yes" => self.verify_tls = true,
                other => warn!(value = other, "Ignoring unrecognized SF_VERIFY_TLS"),
            }
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::builder()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_tls_verification(self.verify_tls)
            .build()
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            queued_delay: Duration::from_millis(self.poll.queued_delay_ms),
            running_delay: Duration::from_millis(self.poll.running_delay_ms),
        }
    }

    /// Debug header categories in name order.
    pub fn debug_categories(&self) -> Vec<(String, String)> {
        self.debug_levels
            .iter()
            .map(|(category, level)| (category.clone(), level.clone()))
            .collect()
    }

    /// Session manager for the configured login.
    ///
    /// A refresh token with a client id selects the OAuth login; otherwise
    /// username and password are required.
    pub fn session_manager(&self, transport: Arc<dyn Transport>) -> Result<SessionManager> {
        let sessions = match (&self.refresh_token, &self.client_id) {
            (Some(refresh_token), Some(client_id)) => {
                let mut config = OAuthConfig::new(client_id.clone());
                if let Some(secret) = &self.client_secret {
                    config = config.with_secret(secret.clone());
                }
                let login = RefreshTokenLogin::new(config, refresh_token.clone())
                    .with_login_url(self.login_url.clone())
                    .with_client_config(&self.client_config())
                    .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;
                SessionManager::new(login)
            }
            _ => {
                let (Some(username), Some(password)) = (&self.username, &self.password) else {
                    return Err(Error::new(ErrorKind::Config(
                        "username and password, or client_id and refresh_token, are required"
                            .to_string(),
                    )));
                };
                let mut login = SoapLogin::new(transport, username.clone(), password.clone())
                    .with_login_url(self.login_url.clone())
                    .with_api_version(self.api_version.clone());
                if let Some(token) = &self.security_token {
                    login = login.with_security_token(token.clone());
                }
                SessionManager::new(login)
            }
        };

        if !self.session_cache {
            return Ok(sessions);
        }
        match FileSessionStore::new() {
            Ok(store) => Ok(sessions.with_store(store)),
            Err(err) => {
                warn!(error = %err, "Session cache unavailable");
                Ok(sessions)
            }
        }
    }

    /// Metadata client wired from these settings.
    pub fn metadata_client(&self) -> Result<MetadataClient> {
        let transport: Arc<dyn Transport> = Arc::new(
            HttpTransport::new(self.client_config())
                .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?,
        );
        let sessions = self.session_manager(transport.clone())?;
        Ok(MetadataClient::new(Arc::new(sessions), transport)
            .with_api_version(self.api_version.clone())
            .with_poll_policy(self.poll_policy())
            .with_debug_categories(self.debug_categories()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.api_version, DEFAULT_API_VERSION);
        assert_eq!(settings.login_url, PRODUCTION_LOGIN_URL);
        assert!(settings.verify_tls);
        assert_eq!(settings.poll_policy(), PollPolicy::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sforge.json");
        std::fs::write(
            &path,
            r#"{
                "api_version": "58.0",
                "login_url": "https://test.salesforce.com",
                "username": "dev@example.com",
                "deploy_options": { "checkOnly": true, "testLevel": "RunLocalTests" },
                "poll": { "queued_delay_ms": 500 },
                "debug_levels": { "Apex_code": "Debug", "Db": "Info" }
            }"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.api_version, "58.0");
        assert_eq!(settings.username.as_deref(), Some("dev@example.com"));
        assert!(settings.deploy_options.check_only);
        assert!(settings.deploy_options.rollback_on_error);
        assert_eq!(settings.poll.queued_delay_ms, 500);
        assert_eq!(settings.poll.running_delay_ms, 1000);
        assert_eq!(
            settings.debug_categories(),
            vec![
                ("Apex_code".to_string(), "Debug".to_string()),
                ("Db".to_string(), "Info".to_string()),
            ]
        );
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("SF_USERNAME", "env@example.com"),
            ("SF_PASSWORD", "secret"),
            ("SF_API_VERSION", ""),
            ("SF_VERIFY_TLS", "false"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings {
            username: Some("file@example.com".to_string()),
            ..Default::default()
        };
        settings.apply_vars(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(settings.username.as_deref(), Some("env@example.com"));
        assert_eq!(settings.password.as_deref(), Some("secret"));
        assert_eq!(settings.api_version, DEFAULT_API_VERSION);
        assert!(!settings.verify_tls);
    }

    #[test]
    fn test_missing_credentials() {
        let settings = Settings {
            session_cache: false,
            ..Default::default()
        };
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::default_transport().unwrap());
        let err = settings.session_manager(transport).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Config(_)));
    }

    #[test]
    fn test_oauth_login_uses_client_settings() {
        let settings = Settings {
            client_id: Some("app".to_string()),
            refresh_token: Some("rt".to_string()),
            timeout_secs: 5,
            verify_tls: false,
            session_cache: false,
            ..Default::default()
        };
        assert_eq!(settings.client_config().timeout, Duration::from_secs(5));
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::default_transport().unwrap());
        assert!(settings.session_manager(transport).is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let settings = Settings {
            password: Some("hunter2".to_string()),
            refresh_token: Some("5Aep861".to_string()),
            ..Default::default()
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("5Aep861"));
        assert!(debug.contains("[REDACTED]"));
    }
}
