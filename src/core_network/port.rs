use crate::core_network::DataChannelError;
use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use log::{error, info};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Parses the `h1,h2,h3,h4,p1,p2` argument of PORT.
pub fn parse_port_argument(arg: &str) -> Result<SocketAddrV4, DataChannelError> {
    let parts: Vec<u8> = arg
        .trim()
        .split(',')
        .map(|x| x.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| DataChannelError::Syntax(arg.to_string()))?;

    let [h1, h2, h3, h4, p1, p2] = parts[..] else {
        return Err(DataChannelError::Syntax(arg.to_string()));
    };
    let port = u16::from(p1) << 8 | u16::from(p2);
    Ok(SocketAddrV4::new(Ipv4Addr::new(h1, h2, h3, h4), port))
}

/// Sets up an active mode (PORT) connection.
pub async fn setup_port_connection(
    addr: SocketAddrV4,
    timeout: Duration,
) -> Result<TcpStream, DataChannelError> {
    let addr = SocketAddr::V4(addr);
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(DataChannelError::Connect { addr, source }),
        Err(_) => Err(DataChannelError::Connect {
            addr,
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
        }),
    }
}

/// Handles the PORT (Active Mode) FTP command.
pub async fn handle_port_command(
    writer: ControlWriter,
    state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let mut session = session.lock().await;
    if session.is_transferring() && session.data.is_connected() {
        return send_reply(&writer, &DataChannelError::AlreadyConnected.to_ftp_response()).await;
    }
    session.close_data_connection();

    let addr = match parse_port_argument(&arg) {
        Ok(addr) => addr,
        Err(e) => return send_reply(&writer, &e.to_ftp_response()).await,
    };
    info!("{} PORT {}", writer.id(), addr);

    match setup_port_connection(addr, state.config.control_timeout()).await {
        Ok(stream) => {
            session.data.connected(stream);
            send_reply(&writer, "200 PORT command successful.").await
        }
        Err(e) => {
            error!("{} {}", writer.id(), e);
            send_reply(&writer, &e.to_ftp_response()).await
        }
    }
}
