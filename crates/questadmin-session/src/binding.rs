//! UI-facing auth state
//!
//! [`AuthBinding`] is a read-only projection of the [`SessionStore`]: UI code
//! subscribes to [`AuthSnapshot`]s, while every mutation still goes through
//! the store so the token read path never lags behind.

use std::sync::Arc;
use tokio::sync::watch;

use crate::session::Session;
use crate::state::AuthState;
use crate::store::{SessionReader, SessionStore};
use crate::token::TokenAccessor;

/// The auth state as a component renders it
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    pub state: AuthState,
}

impl AuthSnapshot {
    fn read(reader: &SessionReader) -> Self {
        Self {
            session: reader.get(),
            state: reader.state(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }
}

pub struct AuthBinding {
    store: SessionStore,
    accessor: TokenAccessor,
    snapshot: Arc<watch::Sender<AuthSnapshot>>,
}

impl AuthBinding {
    pub fn new(store: SessionStore, accessor: TokenAccessor) -> Self {
        let reader = store.reader();
        let (snapshot, _) = watch::channel(AuthSnapshot::read(&reader));
        let snapshot = Arc::new(snapshot);

        // Accessor first, then the UI projection
        let publish_accessor = accessor.clone();
        let publish_snapshot = Arc::clone(&snapshot);
        store.subscribe(move |change| {
            register_accessor(&publish_accessor, &reader);
            publish_snapshot.send_replace(AuthSnapshot {
                session: change.session.clone(),
                state: change.state,
            });
        });

        Self {
            store,
            accessor,
            snapshot,
        }
    }

    /// Hydrate from storage. Only the first call does any work.
    pub fn mount(&self) -> Option<Session> {
        let session = self.store.hydrate();
        register_accessor(&self.accessor, &self.store.reader());
        session
    }

    pub fn session(&self) -> Option<Session> {
        self.store.get()
    }

    pub fn set_session(&self, session: Option<Session>) {
        self.store.set(session);
    }

    pub fn logout(&self) {
        self.store.logout();
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.current_token().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.store.state().is_loading()
    }

    pub fn state(&self) -> AuthState {
        self.store.state()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> AuthSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn token_accessor(&self) -> &TokenAccessor {
        &self.accessor
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}

impl Clone for AuthBinding {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            accessor: self.accessor.clone(),
            snapshot: Arc::clone(&self.snapshot),
        }
    }
}

fn register_accessor(accessor: &TokenAccessor, reader: &SessionReader) {
    let reader = reader.clone();
    accessor.set_accessor(move || reader.token());
}
