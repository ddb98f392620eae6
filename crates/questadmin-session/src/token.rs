//! Token read path for non-reactive code
//!
//! The HTTP client is constructed with a [`TokenProvider`] and asks it for
//! the bearer token before every request.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::persistence::SessionPersistence;

/// Synchronous source of the current bearer token.
pub trait TokenProvider: Send + Sync {
    /// `None` means "send the request unauthenticated"
    fn token(&self) -> Option<String>;
}

type Accessor = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// A swappable token source.
///
/// Until an accessor is registered, reads go straight to the persisted
/// session. Once one is registered, reads are a pure in-memory call.
pub struct TokenAccessor {
    accessor: Arc<RwLock<Option<Accessor>>>,
    fallback: SessionPersistence,
}

impl TokenAccessor {
    pub fn new(fallback: SessionPersistence) -> Self {
        Self {
            accessor: Arc::new(RwLock::new(None)),
            fallback,
        }
    }

    pub fn set_accessor<F>(&self, accessor: F)
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        *self.accessor.write() = Some(Arc::new(accessor));
    }

    pub fn clear_accessor(&self) {
        *self.accessor.write() = None;
    }

    pub fn has_accessor(&self) -> bool {
        self.accessor.read().is_some()
    }

    pub fn get_token(&self) -> Option<String> {
        // Release the lock before calling out
        let accessor = self.accessor.read().clone();

        match accessor {
            Some(accessor) => accessor(),
            None => {
                tracing::trace!("No token accessor registered, reading persisted session");
                self.fallback.load().map(|s| s.token)
            }
        }
    }
}

impl TokenProvider for TokenAccessor {
    fn token(&self) -> Option<String> {
        self.get_token()
    }
}

impl Clone for TokenAccessor {
    fn clone(&self) -> Self {
        Self {
            accessor: Arc::clone(&self.accessor),
            fallback: self.fallback.clone(),
        }
    }
}
