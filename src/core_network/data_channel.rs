use crate::core_network::{DataChannelError, PortLease};
use log::{debug, trace};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataMode {
    #[default]
    None,
    Passive,
    Active,
}

/// The single data connection a session may hold.
///
/// In passive mode the channel owns a listener on a leased port until the
/// client connects; in active mode it owns the socket connected out to the
/// client. `close` releases everything, the port lease included.
#[derive(Default)]
pub struct DataChannel {
    mode: DataMode,
    listener: Option<TcpListener>,
    lease: Option<PortLease>,
    stream: Option<TcpStream>,
}

impl DataChannel {
    pub fn mode(&self) -> DataMode {
        self.mode
    }

    /// True once a peer socket exists.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn port(&self) -> Option<u16> {
        self.lease.as_deref().copied()
    }

    /// Passive mode: wait for the client on `listener`.
    pub fn listen(&mut self, listener: TcpListener, lease: PortLease) {
        self.close();
        self.listener = Some(listener);
        self.lease = Some(lease);
        self.mode = DataMode::Passive;
    }

    /// Active mode: the socket is already connected to the client.
    pub fn connected(&mut self, stream: TcpStream) {
        self.close();
        self.stream = Some(stream);
        self.mode = DataMode::Active;
    }

    /// Makes the peer socket available, accepting it first in passive mode.
    pub async fn open(&mut self, timeout: Duration) -> Result<(), DataChannelError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let listener = match self.listener.as_ref() {
            Some(listener) => listener,
            None => return Err(DataChannelError::BadSequence),
        };

        let (stream, peer) = tokio::time::timeout(timeout, listener.accept())
            .await
            .map_err(|_| DataChannelError::Timeout)?
            .map_err(DataChannelError::Accept)?;
        debug!("Accepted data connection from {}", peer);

        self.listener = None;
        self.stream = Some(stream);
        Ok(())
    }

    pub fn stream(&mut self) -> Option<&mut TcpStream> {
        self.stream.as_mut()
    }

    pub fn close(&mut self) {
        if self.mode != DataMode::None {
            trace!("Closing {:?} data connection on port {:?}", self.mode, self.port());
        }
        self.stream = None;
        self.listener = None;
        self.lease = None;
        self.mode = DataMode::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_network::PortPool;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn passive_channel(pool: &PortPool) -> (DataChannel, u16) {
        let mut channel = DataChannel::default();
        loop {
            let lease = pool.acquire().await.unwrap();
            let port = *lease;
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
                channel.listen(listener, lease);
                return (channel, port);
            }
        }
    }

    #[tokio::test]
    async fn test_passive_open_accepts_the_client() {
        let pool = PortPool::new(41730, 8).unwrap();
        let (mut channel, port) = passive_channel(&pool).await;
        assert_eq!(channel.mode(), DataMode::Passive);
        assert!(!channel.is_connected());

        let client = tokio::spawn(async move {
            let mut socket = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            socket.write_all(b"ping").await.unwrap();
        });

        channel.open(Duration::from_secs(2)).await.unwrap();
        assert!(channel.is_connected());

        let mut buf = [0u8; 4];
        channel.stream().unwrap().read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_returns_the_port_lease() {
        let pool = PortPool::new(41750, 4).unwrap();
        let (mut channel, port) = passive_channel(&pool).await;
        assert_eq!(channel.port(), Some(port));
        assert_eq!(pool.available(), 3);

        channel.close();
        assert_eq!(channel.mode(), DataMode::None);
        assert_eq!(channel.port(), None);
        assert_eq!(pool.available(), 4);
    }

    #[tokio::test]
    async fn test_passive_open_times_out_without_a_client() {
        let pool = PortPool::new(41770, 4).unwrap();
        let (mut channel, _) = passive_channel(&pool).await;
        let err = channel.open(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, DataChannelError::Timeout));
    }
}
