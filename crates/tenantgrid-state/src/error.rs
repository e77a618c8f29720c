//! State store errors.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open state store: {0}")]
    Open(String),

    /// Another process (e.g. a running edge emulator) holds the database.
    #[error("state store {path} is in use by another process")]
    Locked { path: String },

    #[error("state transaction failed: {0}")]
    Transaction(String),

    #[error("state table unavailable: {0}")]
    Table(String),

    #[error("state read failed: {0}")]
    Read(String),

    #[error("state write failed: {0}")]
    Write(String),

    #[error("cannot encode record: {0}")]
    Encode(String),

    #[error("corrupt record: {0}")]
    Decode(String),
}
