//! Questadmin Storage Layer
//!
//! SQLite-backed durable key/value slots. Each slot survives process
//! restarts; absence of a key means "nothing stored".

mod database;
mod error;
mod migrations;

pub use database::{Database, KeyValueStore};
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
