//! Durable session slot
//!
//! One fixed key in a [`KeyValueStore`] holds the JSON-serialized session.
//! Absence of the key means "no session"; anything that does not parse is
//! treated the same way and removed.

use std::sync::Arc;

use questadmin_storage::KeyValueStore;

use crate::session::Session;
use crate::Result;

pub const DEFAULT_SESSION_KEY: &str = "questadmin.session";

/// Parse a stored slot value into a session.
pub fn parse(raw: &str) -> Result<Session> {
    Ok(serde_json::from_str(raw)?)
}

pub struct SessionPersistence {
    storage: Arc<dyn KeyValueStore>,
    key: String,
}

impl SessionPersistence {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(storage, DEFAULT_SESSION_KEY)
    }

    pub fn with_key(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Overwrite the slot with `session`. No merge.
    pub fn save(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string(session)?;
        self.storage.set(&self.key, &json)?;

        tracing::debug!(key = %self.key, user_id = ?session.user_id(), "Saved session");
        Ok(())
    }

    /// Read the stored session.
    ///
    /// A corrupt entry is removed and reported as `None`, as is a storage
    /// read failure.
    pub fn load(&self) -> Option<Session> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to read persisted session");
                return None;
            }
        };

        match parse(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Discarding corrupt persisted session");
                if let Err(e) = self.clear() {
                    tracing::error!(key = %self.key, error = %e, "Failed to clear corrupt session");
                }
                None
            }
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove(&self.key)?;
        tracing::debug!(key = %self.key, "Cleared persisted session");
        Ok(())
    }

    /// The slot's raw contents, without parsing.
    pub fn raw(&self) -> Result<Option<String>> {
        Ok(self.storage.get(&self.key)?)
    }
}

impl Clone for SessionPersistence {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            key: self.key.clone(),
        }
    }
}
