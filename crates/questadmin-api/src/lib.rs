//! Questadmin REST client
//!
//! Reads the bearer token from an injected [`TokenProvider`] before every
//! request and reports `401 Unauthorized` responses to a registered handler.
//! What happens on 401 (clearing the session, redirecting) is up to the
//! caller.
//!
//! [`TokenProvider`]: questadmin_session::TokenProvider

mod client;
mod error;

pub use client::ApiClient;
pub use error::ApiError;
pub use reqwest::Method;

pub type Result<T> = std::result::Result<T, ApiError>;
