//! Dashboard bootstrap
//!
//! [`AdminConsole`] owns the single session store of the process, the UI
//! binding over it, and the REST client reading its token.

use std::sync::Arc;
use std::time::Duration;

use questadmin_api::ApiClient;
use questadmin_session::{
    AuthBinding, Session, SessionPersistence, SessionStore, SessionUser, TokenAccessor,
};
use questadmin_storage::{Database, KeyValueStore};

use crate::config::Config;
use crate::Result;

pub struct AdminConsole {
    config: Config,
    db: Database,
    auth: AuthBinding,
    api: ApiClient,
}

impl AdminConsole {
    pub fn new(config: Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&config.database_path)?;
        Self::with_database(config, db)
    }

    pub fn with_database(config: Config, db: Database) -> Result<Self> {
        let storage: Arc<dyn KeyValueStore> = Arc::new(db.clone());
        let persistence = SessionPersistence::with_key(storage, config.session_key.clone());

        let store = SessionStore::new(persistence.clone());
        let auth = AuthBinding::new(store, TokenAccessor::new(persistence));

        // A rejected token is dropped; redirecting is the UI's job
        let on_unauthorized = auth.clone();
        let api = ApiClient::new(config.api_url()?, Arc::new(auth.token_accessor().clone()))?
            .with_timeout(Duration::from_secs(config.request_timeout_secs))
            .with_unauthorized_handler(move || {
                tracing::info!("Server rejected the session token, signing out");
                on_unauthorized.logout();
            });

        Ok(Self {
            config,
            db,
            auth,
            api,
        })
    }

    /// Restore the persisted session. Safe to call more than once.
    pub fn initialize(&self) -> Option<Session> {
        let session = self.auth.mount();

        tracing::info!(
            authenticated = session.is_some(),
            api = %self.api.base_url(),
            "Admin console initialized"
        );

        session
    }

    pub fn login(&self, token: impl Into<String>, user: Option<SessionUser>) -> Session {
        let mut session = Session::new(token);
        session.user = user;
        self.auth.set_session(Some(session.clone()));
        session
    }

    pub fn logout(&self) {
        self.auth.logout();
    }

    pub fn auth(&self) -> &AuthBinding {
        &self.auth
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl Clone for AdminConsole {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            db: self.db.clone(),
            auth: self.auth.clone(),
            api: self.api.clone(),
        }
    }
}
