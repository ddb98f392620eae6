//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] questadmin_storage::StorageError),

    #[error("Session error: {0}")]
    Session(#[from] questadmin_session::SessionError),

    #[error("API error: {0}")]
    Api(#[from] questadmin_api::ApiError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}
