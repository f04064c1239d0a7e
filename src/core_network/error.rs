// Errors raised while negotiating or opening a data connection
use crate::core_pool::PoolError;
use std::io;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataChannelError {
    #[error("a data connection is already in use")]
    AlreadyConnected,

    #[error("no PASV or PORT negotiated")]
    BadSequence,

    #[error("passive mode needs an IPv4 address, got {0}")]
    NotIpv4(IpAddr),

    #[error("no data port could be bound")]
    NoPortsAvailable,

    #[error("invalid host-port argument: {0}")]
    Syntax(String),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept data connection: {0}")]
    Accept(#[source] io::Error),

    #[error("timed out waiting for the data connection")]
    Timeout,

    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl DataChannelError {
    pub fn to_ftp_response(&self) -> String {
        match self {
            DataChannelError::AlreadyConnected => "425 You're already connected.".to_string(),
            DataChannelError::BadSequence => "503 Bad sequence of commands.".to_string(),
            DataChannelError::NotIpv4(_) => {
                "425 Can't open passive connection on a non IPv4 address.".to_string()
            }
            DataChannelError::NoPortsAvailable => {
                "451 Internal error - No more data ports available.".to_string()
            }
            DataChannelError::Syntax(_) => {
                "501 Syntax error in parameters or arguments.".to_string()
            }
            DataChannelError::Connect { .. } => "425 Failed to establish connection.".to_string(),
            DataChannelError::Accept(_) | DataChannelError::Timeout => {
                "425 Can't open data connection.".to_string()
            }
            DataChannelError::Pool(e) => e.to_ftp_response(),
        }
    }
}
