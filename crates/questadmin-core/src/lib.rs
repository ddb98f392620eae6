//! Questadmin Core
//!
//! Wires storage, session state and the REST client together for the
//! admin dashboard. The session store owns the authentication state; the
//! UI binding and the HTTP client only read from it.

mod config;
mod console;
mod error;

pub use config::Config;
pub use console::AdminConsole;
pub use error::CoreError;

pub use questadmin_api::{ApiClient, ApiError, Method};
pub use questadmin_session::{
    AuthBinding, AuthSnapshot, AuthState, Session, SessionError, SessionStore, SessionUser,
    TokenAccessor, TokenProvider,
};
pub use questadmin_storage::{Database, KeyValueStore, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
