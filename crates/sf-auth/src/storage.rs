//! Session storage so logins survive process restarts.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::session::Session;

/// Trait for session storage implementations.
pub trait SessionStore: Send + Sync {
    /// Load the session stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<Session>>;

    /// Save a session under `key`, replacing any previous one.
    fn save(&self, key: &str, session: &Session) -> Result<()>;

    /// Delete the session stored under `key`.
    fn delete(&self, key: &str) -> Result<()>;
}

/// File-based session storage, one JSON file per key.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    base_path: PathBuf,
}

impl FileSessionStore {
    /// Create a store under the default path.
    ///
    /// Default path: `~/.sforge/sessions/`
    pub fn new() -> Result<Self> {
        Ok(Self {
            base_path: default_session_dir()?,
        })
    }

    /// Create a store under a custom path.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            base_path: path.as_ref().to_path_buf(),
        }
    }

    fn session_path(&self, key: &str) -> PathBuf {
        let safe_key = key
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect::<String>();

        self.base_path.join(format!("{}.json", safe_key))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, key: &str) -> Result<Option<Session>> {
        let path = self.session_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&path)?;
        let stored: StoredSession = serde_json::from_str(&json)?;
        Ok(Some(stored.session))
    }

    fn save(&self, key: &str, session: &Session) -> Result<()> {
        std::fs::create_dir_all(&self.base_path)?;

        let path = self.session_path(key);
        let stored = StoredSession {
            session: session.clone(),
            stored_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string_pretty(&stored)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;

        // `mode` only applies on create; tighten files left by older runs.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(json.as_bytes())?;

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.session_path(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    session: Session,
    stored_at: chrono::DateTime<chrono::Utc>,
}

/// Get the default session storage directory.
pub fn default_session_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        Error::new(ErrorKind::Config(
            "Could not find home directory".to_string(),
        ))
    })?;

    Ok(home.join(".sforge").join("sessions"))
}
