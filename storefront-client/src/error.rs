//! Client error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server rejected request ({status}): {message}")]
    Server { status: u16, message: String },
}

impl From<redb::DatabaseError> for ClientError {
    fn from(e: redb::DatabaseError) -> Self {
        ClientError::Storage(e.to_string())
    }
}

impl From<redb::TransactionError> for ClientError {
    fn from(e: redb::TransactionError) -> Self {
        ClientError::Storage(e.to_string())
    }
}

impl From<redb::TableError> for ClientError {
    fn from(e: redb::TableError) -> Self {
        ClientError::Storage(e.to_string())
    }
}

impl From<redb::StorageError> for ClientError {
    fn from(e: redb::StorageError) -> Self {
        ClientError::Storage(e.to_string())
    }
}

impl From<redb::CommitError> for ClientError {
    fn from(e: redb::CommitError) -> Self {
        ClientError::Storage(e.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
