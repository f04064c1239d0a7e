use crate::core_network::{DataChannelError, PortLease, PortPool};
use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use log::{debug, info, warn};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Handles the PASV FTP command.
///
/// Leases a data port, binds a listener on it and tells the client where to
/// connect. The client connection itself is accepted by the next transfer
/// command.
pub async fn handle_pasv_command(
    writer: ControlWriter,
    state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    let mut session = session.lock().await;
    if session.is_transferring() && session.data.is_connected() {
        return send_reply(&writer, &DataChannelError::AlreadyConnected.to_ftp_response()).await;
    }
    session.close_data_connection();

    let local_ip = writer.local_addr().ip();
    let advertised = state
        .config
        .server
        .pasv_address
        .as_deref()
        .and_then(|addr| addr.parse::<IpAddr>().ok())
        .unwrap_or(local_ip);

    let advertised = match advertised {
        IpAddr::V4(v4) => v4,
        other => {
            let err = DataChannelError::NotIpv4(other);
            warn!("{}: {}", writer.id(), err);
            return send_reply(&writer, &err.to_ftp_response()).await;
        }
    };

    match setup_pasv_listener(&state.ports, local_ip).await {
        Ok((listener, lease)) => {
            let port = *lease;
            session.data.listen(listener, lease);
            info!(
                "{} passive listener on port {}, {} ports left",
                writer.id(),
                port,
                state.ports.available()
            );
            send_reply(&writer, &pasv_reply(advertised, port)).await
        }
        Err(e) => {
            warn!("{} PASV failed: {}", writer.id(), e);
            send_reply(&writer, &e.to_ftp_response()).await
        }
    }
}

/// Binds a listener on a free data port of `ip`.
///
/// A port that fails to bind goes back to the pool and another one is tried,
/// at most once per port in the pool.
pub async fn setup_pasv_listener(
    ports: &PortPool,
    ip: IpAddr,
) -> Result<(TcpListener, PortLease), DataChannelError> {
    for _ in 0..ports.capacity() {
        let lease = ports.acquire().await?;
        let addr = SocketAddr::new(ip, *lease);
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                debug!("PASV listener bound on {}", addr);
                return Ok((listener, lease));
            }
            Err(e) => debug!("Data port {} unavailable: {}", addr, e),
        }
    }
    Err(DataChannelError::NoPortsAvailable)
}

pub fn pasv_reply(ip: Ipv4Addr, port: u16) -> String {
    let [h1, h2, h3, h4] = ip.octets();
    format!(
        "227 Entering Passive Mode ({},{},{},{},{},{}).",
        h1,
        h2,
        h3,
        h4,
        port >> 8,
        port & 0xff
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pasv_reply_encodes_the_port_in_two_bytes() {
        assert_eq!(
            pasv_reply(Ipv4Addr::new(192, 168, 1, 20), 22323),
            "227 Entering Passive Mode (192,168,1,20,87,51)."
        );
    }

    #[tokio::test]
    async fn test_busy_port_is_skipped() {
        let pool = PortPool::new(41790, 2).unwrap();
        let blocker = TcpListener::bind(("127.0.0.1", 41790)).await.unwrap();

        let (_listener, lease) = setup_pasv_listener(&pool, "127.0.0.1".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(*lease, 41791);
        assert_eq!(pool.available(), 1);
        drop(blocker);
    }

    #[tokio::test]
    async fn test_all_ports_busy_reports_exhaustion() {
        let pool = PortPool::new(41795, 1).unwrap();
        let _blocker = TcpListener::bind(("127.0.0.1", 41795)).await.unwrap();

        let result = setup_pasv_listener(&pool, "127.0.0.1".parse().unwrap()).await;
        assert!(matches!(result, Err(DataChannelError::NoPortsAvailable)));
        assert_eq!(format!("{:?}", result), "Err(NoPortsAvailable)");
        assert_eq!(pool.available(), 1);
    }
}
