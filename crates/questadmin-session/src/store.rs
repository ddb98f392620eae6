//! Session Store
//!
//! The authoritative, synchronously updated session value. Every other view
//! of the session (the token read path, the UI projection) reads from here.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::persistence::SessionPersistence;
use crate::session::Session;
use crate::state::AuthState;
use crate::token::TokenProvider;

/// The store's value at the moment a listener runs
#[derive(Debug, Clone, PartialEq)]
pub struct SessionChange {
    pub session: Option<Session>,
    pub state: AuthState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SessionChange) + Send + Sync>;

pub struct SessionStore {
    /// Current session; written before any other effect of `set`
    mirror: Arc<RwLock<Option<Session>>>,
    /// Lifecycle state, observable by async waiters
    state: Arc<watch::Sender<AuthState>>,
    /// Change listeners, called in registration order
    listeners: Arc<RwLock<Vec<(ListenerId, Listener)>>>,
    next_listener: Arc<AtomicU64>,
    /// Serializes `set` and `hydrate` so mirror and storage never diverge
    writes: Arc<Mutex<()>>,
    persistence: SessionPersistence,
}

impl SessionStore {
    pub fn new(persistence: SessionPersistence) -> Self {
        let (state, _) = watch::channel(AuthState::Uninitialized);

        Self {
            mirror: Arc::new(RwLock::new(None)),
            state: Arc::new(state),
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_listener: Arc::new(AtomicU64::new(0)),
            writes: Arc::new(Mutex::new(())),
            persistence,
        }
    }

    pub fn get(&self) -> Option<Session> {
        self.mirror.read().clone()
    }

    /// Token of the current session, without cloning the profile
    pub fn current_token(&self) -> Option<String> {
        self.mirror.read().as_ref().map(|s| s.token.clone())
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Replace the session.
    ///
    /// The in-memory value is updated first, so any read issued after this
    /// returns sees `session`. Persistence and listeners follow.
    pub fn set(&self, session: Option<Session>) {
        {
            let _writing = self.writes.lock();
            *self.mirror.write() = session.clone();

            let persisted = match &session {
                Some(s) => self.persistence.save(s),
                None => self.persistence.clear(),
            };
            if let Err(e) = persisted {
                tracing::error!(error = %e, "Failed to persist session change");
            }

            let target = AuthState::for_session(session.as_ref());
            self.state.send_if_modified(|current| {
                if *current != target && current.can_transition_to(target) {
                    *current = target;
                    true
                } else {
                    false
                }
            });
        }

        tracing::info!(
            authenticated = session.is_some(),
            user_id = ?session.as_ref().and_then(|s| s.user_id()),
            "Session updated"
        );

        self.notify();
    }

    pub fn logout(&self) {
        self.set(None);
        tracing::info!("Logged out");
    }

    /// Load the persisted session into memory.
    ///
    /// Runs once per store. Later calls, or calls after an explicit `set`,
    /// leave the store untouched and return the current value.
    pub fn hydrate(&self) -> Option<Session> {
        let entered = self.state.send_if_modified(|current| {
            if current.can_transition_to(AuthState::Hydrating) {
                *current = AuthState::Hydrating;
                true
            } else {
                false
            }
        });
        if !entered {
            tracing::debug!(state = %self.state(), "Session store already hydrated");
            return self.get();
        }

        let session = {
            let _writing = self.writes.lock();

            // A `set` that got in first already left Hydrating; its value stands
            if self.state() != AuthState::Hydrating {
                tracing::debug!(state = %self.state(), "Session set during hydration");
                return self.get();
            }

            let session = self.persistence.load();
            *self.mirror.write() = session.clone();
            self.state.send_replace(AuthState::for_session(session.as_ref()));
            session
        };

        tracing::info!(
            authenticated = session.is_some(),
            user_id = ?session.as_ref().and_then(|s| s.user_id()),
            "Hydrated session"
        );

        self.notify();

        session
    }

    /// Bootstrap entry point for async callers; equivalent to `hydrate`.
    pub async fn initialize(&self) -> Option<Session> {
        self.hydrate()
    }

    /// Resolves once the store has left the loading window.
    pub async fn ready(&self) -> AuthState {
        let mut rx = self.state.subscribe();
        let result = rx.wait_for(|state| state.is_ready()).await.map(|s| *s);
        // The sender lives as long as `self`, so the channel cannot close here
        result.unwrap_or_else(|_| self.state())
    }

    pub fn state_receiver(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Register a change listener.
    ///
    /// Listeners run synchronously after the mirror and storage are updated,
    /// with no store lock held; they may call back into the store.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SessionChange) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// A read-only handle on the live session value
    pub fn reader(&self) -> SessionReader {
        SessionReader {
            mirror: Arc::clone(&self.mirror),
            state: self.state.subscribe(),
        }
    }

    pub fn persistence(&self) -> &SessionPersistence {
        &self.persistence
    }

    /// Each listener gets the value current when it runs, so one that
    /// follows a re-entrant `set` never sees what that `set` replaced.
    fn notify(&self) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            listener(&SessionChange {
                session: self.get(),
                state: self.state(),
            });
        }
    }
}

impl TokenProvider for SessionStore {
    fn token(&self) -> Option<String> {
        if self.is_ready() {
            self.current_token()
        } else {
            self.persistence.load().map(|s| s.token)
        }
    }
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        Self {
            mirror: Arc::clone(&self.mirror),
            state: Arc::clone(&self.state),
            listeners: Arc::clone(&self.listeners),
            next_listener: Arc::clone(&self.next_listener),
            writes: Arc::clone(&self.writes),
            persistence: self.persistence.clone(),
        }
    }
}

/// Read-only view of a [`SessionStore`].
///
/// Holds no reference to the store's listeners, so it can be captured by a
/// listener without forming a cycle.
#[derive(Clone)]
pub struct SessionReader {
    mirror: Arc<RwLock<Option<Session>>>,
    state: watch::Receiver<AuthState>,
}

impl SessionReader {
    pub fn get(&self) -> Option<Session> {
        self.mirror.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.mirror.read().as_ref().map(|s| s.token.clone())
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::DEFAULT_SESSION_KEY;
    use crate::session::SessionUser;
    use questadmin_storage::{Database, KeyValueStore};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn store() -> (Database, SessionStore) {
        let db = Database::open_in_memory().unwrap();
        let store = SessionStore::new(SessionPersistence::new(Arc::new(db.clone())));
        (db, store)
    }

    #[test]
    fn test_set_is_visible_immediately() {
        let (db, store) = store();
        store.hydrate();

        store.set(Some(Session::new("tok-1")));
        assert_eq!(store.current_token().as_deref(), Some("tok-1"));
        assert_eq!(store.token().as_deref(), Some("tok-1"));
        assert_eq!(store.state(), AuthState::Authenticated);
        assert_eq!(
            db.get_setting(DEFAULT_SESSION_KEY).unwrap().as_deref(),
            Some(r#"{"token":"tok-1"}"#)
        );
    }

    #[test]
    fn test_logout_clears_everything() {
        let (db, store) = store();
        store.hydrate();
        store.set(Some(Session::new("tok-1")));

        store.logout();
        assert_eq!(store.get(), None);
        assert_eq!(store.token(), None);
        assert_eq!(store.state(), AuthState::Anonymous);
        assert_eq!(db.get_setting(DEFAULT_SESSION_KEY).unwrap(), None);

        store.logout();
        assert_eq!(store.get(), None);
        assert_eq!(store.state(), AuthState::Anonymous);
        assert_eq!(db.get_setting(DEFAULT_SESSION_KEY).unwrap(), None);
    }

    #[test]
    fn test_hydrate_restores_persisted_session() {
        let (db, store) = store();
        db.set_setting(
            DEFAULT_SESSION_KEY,
            r#"{"token":"tok-1","user":{"id":"9","email":"u@x.io"}}"#,
        )
        .unwrap();

        let restored = store.hydrate();
        let expected = Session::new("tok-1").with_user(SessionUser::new("9", "u@x.io"));
        assert_eq!(restored, Some(expected.clone()));
        assert_eq!(store.get(), Some(expected));
        assert_eq!(store.state(), AuthState::Authenticated);
    }

    #[test]
    fn test_hydrate_recovers_from_corruption() {
        let (db, store) = store();
        db.set_setting(DEFAULT_SESSION_KEY, "garbage{").unwrap();

        assert_eq!(store.hydrate(), None);
        assert_eq!(store.state(), AuthState::Anonymous);
        assert_eq!(db.get_setting(DEFAULT_SESSION_KEY).unwrap(), None);
    }

    #[test]
    fn test_hydrate_runs_once() {
        let (db, store) = store();
        store.hydrate();
        assert_eq!(store.state(), AuthState::Anonymous);

        // A later write to storage is not picked up by a second hydrate
        db.set_setting(DEFAULT_SESSION_KEY, r#"{"token":"late"}"#)
            .unwrap();
        assert_eq!(store.hydrate(), None);
        assert_eq!(store.state(), AuthState::Anonymous);
    }

    #[test]
    fn test_set_before_hydrate_wins() {
        let (db, store) = store();
        db.set_setting(DEFAULT_SESSION_KEY, r#"{"token":"stale"}"#)
            .unwrap();

        store.set(Some(Session::new("fresh")));
        assert_eq!(store.hydrate(), Some(Session::new("fresh")));
        assert_eq!(store.current_token().as_deref(), Some("fresh"));
    }

    #[test]
    fn test_token_falls_back_to_storage_before_ready() {
        let (db, store) = store();
        db.set_setting(DEFAULT_SESSION_KEY, r#"{"token":"stored"}"#)
            .unwrap();

        assert_eq!(store.state(), AuthState::Uninitialized);
        assert_eq!(store.current_token(), None);
        assert_eq!(store.token().as_deref(), Some("stored"));
    }

    #[test]
    fn test_listeners_see_changes_in_order() {
        let (_db, store) = store();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        store.subscribe(move |change| {
            sink.lock()
                .push(change.session.as_ref().map(|s| s.token.clone()));
        });

        store.hydrate();
        store.set(Some(Session::new("a")));
        store.set(Some(Session::new("b")));
        store.logout();

        assert_eq!(
            *seen.lock(),
            vec![None, Some("a".to_string()), Some("b".to_string()), None]
        );
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let (_db, store) = store();
        let count = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&count);
        let id = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.set(Some(Session::new("a")));
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.set(Some(Session::new("b")));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reentrant_set_from_listener() {
        let (_db, store) = store();
        store.hydrate();

        let inner = store.clone();
        store.subscribe(move |change| {
            if change.session.as_ref().map(|s| s.token.as_str()) == Some("exchange-me") {
                inner.set(Some(Session::new("exchanged")));
                assert_eq!(inner.current_token().as_deref(), Some("exchanged"));
            }
        });

        store.set(Some(Session::new("exchange-me")));
        assert_eq!(store.current_token().as_deref(), Some("exchanged"));
        assert_eq!(store.persistence().load(), Some(Session::new("exchanged")));
    }

    #[test]
    fn test_listener_after_reentrant_set_sees_final_value() {
        let (_db, store) = store();
        store.hydrate();

        let inner = store.clone();
        store.subscribe(move |change| {
            if change.session.as_ref().map(|s| s.token.as_str()) == Some("exchange-me") {
                inner.set(Some(Session::new("exchanged")));
            }
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(move |change| {
            sink.lock()
                .push(change.session.as_ref().map(|s| s.token.clone()));
        });

        store.set(Some(Session::new("exchange-me")));

        let seen = seen.lock();
        assert!(!seen.contains(&Some("exchange-me".to_string())));
        assert_eq!(seen.last(), Some(&Some("exchanged".to_string())));
        assert_eq!(store.current_token().as_deref(), Some("exchanged"));
    }

    /// Storage whose reads wait for a go-ahead, to hold `hydrate` mid-load
    struct GatedStorage {
        db: Database,
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl KeyValueStore for GatedStorage {
        fn get(&self, key: &str) -> questadmin_storage::Result<Option<String>> {
            if let Some(entered) = self.entered.lock().take() {
                entered.send(()).ok();
                self.release.lock().recv().ok();
            }
            self.db.get_setting(key)
        }

        fn set(&self, key: &str, value: &str) -> questadmin_storage::Result<()> {
            self.db.set_setting(key, value)
        }

        fn remove(&self, key: &str) -> questadmin_storage::Result<()> {
            self.db.delete_setting(key)
        }
    }

    #[test]
    fn test_set_during_hydrate_keeps_mirror_and_storage_equal() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting(DEFAULT_SESSION_KEY, r#"{"token":"stale"}"#)
            .unwrap();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let storage = GatedStorage {
            db: db.clone(),
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
        };
        let store = SessionStore::new(SessionPersistence::new(Arc::new(storage)));

        let hydrating = store.clone();
        let hydrate = thread::spawn(move || hydrating.hydrate());
        entered_rx.recv().unwrap();
        assert_eq!(store.state(), AuthState::Hydrating);

        let writer = store.clone();
        let login = thread::spawn(move || writer.set(Some(Session::new("fresh"))));
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        hydrate.join().unwrap();
        login.join().unwrap();

        assert_eq!(store.current_token().as_deref(), Some("fresh"));
        assert_eq!(
            db.get_setting(DEFAULT_SESSION_KEY).unwrap().as_deref(),
            Some(r#"{"token":"fresh"}"#)
        );
        assert_eq!(store.state(), AuthState::Authenticated);
    }

    #[test]
    fn test_reader_tracks_store() {
        let (_db, store) = store();
        let reader = store.reader();

        store.hydrate();
        store.set(Some(Session::new("r")));
        assert_eq!(reader.token().as_deref(), Some("r"));
        assert_eq!(reader.state(), AuthState::Authenticated);

        store.logout();
        assert_eq!(reader.get(), None);
    }

    #[tokio::test]
    async fn test_ready_resolves_after_initialize() {
        let (_db, store) = store();

        let waiter = store.clone();
        let handle = tokio::spawn(async move { waiter.ready().await });

        store.initialize().await;
        assert_eq!(handle.await.unwrap(), AuthState::Anonymous);

        // Already ready: resolves immediately
        assert_eq!(store.ready().await, AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_state_receiver_never_reports_loading_after_ready() {
        let (_db, store) = store();
        let mut rx = store.state_receiver();
        assert!(rx.borrow_and_update().is_loading());

        store.hydrate();
        store.set(Some(Session::new("a")));
        store.logout();
        store.hydrate();

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_ready());
        assert!(store.state().is_ready());
    }
}
