// Errors raised by the object store backends
use crate::core_pool::PoolError;
use crate::core_storage::Oid;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("large object {0} does not exist")]
    MissingObject(Oid),

    #[error("entry {0} does not exist")]
    MissingEntry(Uuid),

    #[error("name {0} is already stored")]
    DuplicateName(String),

    #[error("concurrent update of {0}")]
    Conflict(String),

    #[error("transaction already finished")]
    TransactionClosed,
}

impl StorageError {
    pub fn to_ftp_response(&self) -> String {
        match self {
            StorageError::Pool(e) => e.to_ftp_response(),
            StorageError::Database(_) | StorageError::TransactionClosed => {
                "451 Requested action aborted. Local error in processing.".to_string()
            }
            _ => format!("550 {}", self),
        }
    }
}
