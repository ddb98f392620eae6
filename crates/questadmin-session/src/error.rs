//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(#[from] questadmin_storage::StorageError),

    #[error("Malformed session data: {0}")]
    Malformed(#[from] serde_json::Error),
}
