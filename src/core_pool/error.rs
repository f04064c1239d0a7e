use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Pool is closed")]
    Closed,

    #[error("Failed to populate pool slot {slot}: {reason}")]
    Populate { slot: usize, reason: String },

    #[error("Pool size must be at least 1")]
    Empty,
}

impl PoolError {
    pub fn to_ftp_response(&self) -> String {
        match self {
            PoolError::Closed => "421 Service not available, closing control connection.".to_string(),
            _ => "451 Requested action aborted. Local error in processing.".to_string(),
        }
    }
}
