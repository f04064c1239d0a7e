// Errors raised while moving bytes between a data socket and the store
use crate::core_storage::StorageError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("data connection error: {0}")]
    Io(#[from] io::Error),

    #[error("data connection is not open")]
    NotConnected,

    #[error("restart offset {offset} exceeds object size {len}")]
    OffsetBeyondEnd { offset: u64, len: u64 },

    #[error("Transferred bytes are less than 1")]
    Empty,
}

impl TransferError {
    /// Reply for a failed upload.
    pub fn to_ftp_response(&self) -> String {
        match self {
            TransferError::Io(_) => "426 Connection closed; transfer aborted.".to_string(),
            TransferError::NotConnected => "425 Can't open data connection.".to_string(),
            TransferError::OffsetBeyondEnd { .. } | TransferError::Empty => {
                format!("550 Can't store file. {}", self)
            }
            TransferError::Storage(e) => format!("550 {}", e),
        }
    }
}
