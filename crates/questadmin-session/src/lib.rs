//! Questadmin Session Management
//!
//! - One live authentication session per process
//! - Writes are visible to the very next read, on any code path
//! - The session survives restarts; corrupt storage degrades to "signed out"
//! - UI code observes changes through [`AuthBinding`]; non-reactive code
//!   reads the bearer token through a [`TokenProvider`]

mod binding;
mod error;
mod persistence;
mod session;
mod state;
mod store;
mod token;

pub use binding::{AuthBinding, AuthSnapshot};
pub use error::SessionError;
pub use persistence::{parse, SessionPersistence, DEFAULT_SESSION_KEY};
pub use session::{Session, SessionUser};
pub use state::AuthState;
pub use store::{ListenerId, SessionChange, SessionReader, SessionStore};
pub use token::{TokenAccessor, TokenProvider};

pub type Result<T> = std::result::Result<T, SessionError>;
