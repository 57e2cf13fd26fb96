use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ClientError, Result};

/// Fixed name of the persisted identity record inside the session directory.
pub const SESSION_FILE: &str = "user.json";

/// The logged-in user as persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub token: Option<String>,
}

impl Identity {
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            user_id: None,
            token: None,
        }
    }
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The persisted identity, if any. A missing or unreadable record both
    /// mean "not logged in".
    pub fn current_identity(&self) -> Option<Identity> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read session {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<Identity>(&raw) {
            Ok(identity) if !identity.username.trim().is_empty() => Some(identity),
            Ok(_) => {
                warn!("Session {} has an empty username, ignoring", self.path.display());
                None
            }
            Err(e) => {
                warn!("Corrupt session {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Like [`current_identity`](Self::current_identity), but absence is an error
    /// that callers turn into "go to login".
    pub fn require_identity(&self) -> Result<Identity> {
        self.current_identity().ok_or(ClientError::Unauthenticated)
    }

    pub fn save(&self, identity: &Identity) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(identity)?;
        std::fs::write(&self.path, json)?;
        debug!("Session saved for {}", identity.username);
        Ok(())
    }

    /// Logout. Clearing an absent session is not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_session_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.current_identity().is_none());
        assert!(matches!(store.require_identity(), Err(ClientError::Unauthenticated)));
    }

    #[test]
    fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested"));
        let identity = Identity {
            username: "alice".into(),
            user_id: Some(Uuid::new_v4()),
            token: Some("tok".into()),
        };

        store.save(&identity).unwrap();
        assert_eq!(store.current_identity(), Some(identity.clone()));
        assert_eq!(store.require_identity().unwrap(), identity);

        store.clear().unwrap();
        assert!(store.current_identity().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn username_only_record_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        std::fs::write(store.path(), r#"{"username":"test123"}"#).unwrap();
        assert_eq!(store.current_identity(), Some(Identity::named("test123")));
    }

    #[test]
    fn corrupt_or_empty_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.current_identity().is_none());

        std::fs::write(store.path(), r#"{"username":"  "}"#).unwrap();
        assert!(store.current_identity().is_none());
    }
}
