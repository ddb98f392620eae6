//! Authentication state machine
//!
//! ```text
//! Uninitialized
//!   ↓ hydrate
//! Hydrating
//!   ↓ storage read
//! Authenticated ⇄ Anonymous
//! ```
//!
//! An explicit write before hydration moves straight to a ready state and
//! hydration is skipped.

use serde::{Deserialize, Serialize};

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthState {
    /// Process started, storage not yet read
    Uninitialized,
    /// The one-time storage read is in progress
    Hydrating,
    /// A session is held
    Authenticated,
    /// No session is held
    Anonymous,
}

impl AuthState {
    pub fn for_session(session: Option<&Session>) -> Self {
        match session {
            Some(_) => AuthState::Authenticated,
            None => AuthState::Anonymous,
        }
    }

    pub fn can_transition_to(&self, target: AuthState) -> bool {
        match (self, target) {
            (AuthState::Uninitialized, AuthState::Hydrating) => true,
            // Explicit write before any hydration
            (AuthState::Uninitialized, AuthState::Authenticated) => true,
            (AuthState::Uninitialized, AuthState::Anonymous) => true,
            (AuthState::Hydrating, AuthState::Authenticated) => true,
            (AuthState::Hydrating, AuthState::Anonymous) => true,
            (AuthState::Authenticated, AuthState::Anonymous) => true,
            (AuthState::Anonymous, AuthState::Authenticated) => true,
            // Replacing one session with another, or clearing twice
            (AuthState::Authenticated, AuthState::Authenticated) => true,
            (AuthState::Anonymous, AuthState::Anonymous) => true,
            _ => false,
        }
    }

    /// True until the first storage read (or explicit write) has completed
    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Uninitialized | AuthState::Hydrating)
    }

    pub fn is_ready(&self) -> bool {
        !self.is_loading()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Uninitialized => "uninitialized",
            AuthState::Hydrating => "hydrating",
            AuthState::Authenticated => "authenticated",
            AuthState::Anonymous => "anonymous",
        }
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
