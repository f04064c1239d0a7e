use crate::constants::MAX_COMMAND_LINE;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::handlers::initialize_command_handlers;
use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::{Session, SessionStatus};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify, Semaphore};

pub async fn start_server(state: Arc<ServerState>) -> Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.server.listen_address, state.config.server.listen_port
    );
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to listen on {}", addr))?;
    info!("Server listening on {}", addr);

    serve(listener, state).await
}

/// Accept loop: one task per control connection, bounded by `max_connections`.
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> Result<()> {
    let slots = Arc::new(Semaphore::new(state.config.server.max_connections));
    let mut counter: u64 = 0;

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept control connection: {}", e);
                continue;
            }
        };
        counter += 1;
        let id = format!("{}-{}", counter, addr);

        let Ok(permit) = Arc::clone(&slots).try_acquire_owned() else {
            warn!("{} rejected, {} sessions active", id, state.registry.active());
            tokio::spawn(reject_connection(socket));
            continue;
        };

        info!("{} New connection", id);
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, &id, state).await {
                warn!("{} Connection error: {}", id, e);
            }
            info!("{} Connection closed", id);
            drop(permit);
        });
    }
}

async fn reject_connection(mut socket: TcpStream) {
    let _ = socket
        .write_all(b"421 Too many connections, try again later.\r\n")
        .await;
    let _ = socket.shutdown().await;
}

/// Runs one control connection from greeting to teardown.
pub async fn handle_connection(
    socket: TcpStream,
    id: &str,
    state: Arc<ServerState>,
) -> std::io::Result<()> {
    let local_addr = socket.local_addr()?;
    let (read_half, write_half) = socket.into_split();
    let writer = ControlWriter::new(id, local_addr, write_half);
    let session = Arc::new(Mutex::new(Session::new(id)));

    let shutdown = state.registry.register(id);
    state
        .liveness
        .add(id, state.config.liveness.session_ttl_ticks)
        .await;

    let result = command_loop(read_half, &writer, &state, &session, &shutdown).await;

    {
        let mut session = session.lock().await;
        session.close_data_connection();
        session.status = SessionStatus::Disconnected;
        debug!(
            "{} session ends for client {}",
            session.id,
            session.client_id.as_deref().unwrap_or("<anonymous>")
        );
    }
    if state.liveness.contains(id).await {
        debug!(
            "{} liveness entry dropped with {:?} ticks left",
            id,
            state.liveness.ticks(id).await
        );
        state.liveness.remove(id).await;
    }
    state.registry.unregister(id);

    result
}

async fn command_loop(
    read_half: OwnedReadHalf,
    writer: &ControlWriter,
    state: &Arc<ServerState>,
    session: &Arc<Mutex<Session>>,
    shutdown: &Notify,
) -> std::io::Result<()> {
    let id = writer.id();
    let ttl = state.config.liveness.session_ttl_ticks;
    let timeout = state.config.control_timeout();

    send_reply(writer, &format!("220 {}", state.config.server.banner)).await?;

    let handlers = initialize_command_handlers();
    let mut reader = BufReader::new(read_half);
    let mut line = Vec::new();
    let mut overlong = false;

    loop {
        let mut limited = (&mut reader).take((MAX_COMMAND_LINE - line.len()) as u64);
        let read = tokio::select! {
            _ = shutdown.notified() => {
                info!("{} idle session expired", id);
                return send_reply(writer, "421 Idle session expired, closing control connection.").await;
            }
            read = tokio::time::timeout(timeout, limited.read_until(b'\n', &mut line)) => read,
        };

        let n = match read {
            Ok(n) => n?,
            Err(_) => {
                if session.lock().await.is_transferring() {
                    continue;
                }
                info!("{} control connection timed out", id);
                return send_reply(writer, "421 Timeout, closing control connection.").await;
            }
        };
        if n == 0 {
            info!("{} Client disconnected", id);
            return Ok(());
        }

        // The rest of an oversized line is dropped up to its terminator.
        if !line.ends_with(b"\n") && line.len() >= MAX_COMMAND_LINE {
            line.clear();
            if !overlong {
                warn!("{} command line exceeds {} bytes", id, MAX_COMMAND_LINE);
                send_reply(writer, "500 Command line too long.").await?;
            }
            overlong = true;
            continue;
        }
        if overlong {
            overlong = false;
            line.clear();
            continue;
        }

        let command = String::from_utf8_lossy(&line).trim().to_string();
        line.clear();
        if command.is_empty() {
            send_reply(writer, "501 empty command.").await?;
            continue;
        }

        let (verb, arg) = split_command(&command);
        if verb == "PASS" {
            info!("{} Q: PASS ****", id);
        } else {
            info!("{} Q: {}", id, command);
        }

        state.liveness.disable(id).await;

        let handler = FtpCommand::from_str(&verb).and_then(|cmd| handlers.get(&cmd).map(|h| (cmd, h)));
        match handler {
            Some((cmd, handler)) => {
                if cmd.requires_login() && !session.lock().await.logged_in {
                    send_reply(writer, "332 authentication required").await?;
                } else {
                    handler(
                        writer.clone(),
                        Arc::clone(state),
                        Arc::clone(session),
                        arg,
                    )
                    .await?;
                }
            }
            None => send_reply(writer, "502 Command not implemented.").await?,
        }

        if session.lock().await.is_disconnected() {
            state.liveness.erase(id).await;
            return Ok(());
        }
        state.liveness.remove(id).await;
        state.liveness.add(id, ttl).await;
    }
}

/// Splits a command line into its upper-cased verb and the rest of the line.
pub fn split_command(line: &str) -> (String, String) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.trim().to_string()),
        None => (line.to_ascii_uppercase(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StorageBackend};
    use crate::core_storage::{MemoryObjectStore, ObjectStore};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::tcp::OwnedWriteHalf;

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("retr  file.bin\r\n"), ("RETR".into(), "file.bin".into()));
        assert_eq!(split_command("Pasv"), ("PASV".into(), String::new()));
        assert_eq!(split_command("LIST -l -a"), ("LIST".into(), "-l -a".into()));
    }

    struct Client {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl Client {
        async fn connect(addr: std::net::SocketAddr) -> Self {
            let (read_half, writer) = TcpStream::connect(addr).await.unwrap().into_split();
            let mut client = Client {
                reader: BufReader::new(read_half),
                writer,
            };
            assert!(client.reply().await.starts_with("220 "));
            client
        }

        async fn send(&mut self, command: &str) {
            self.writer
                .write_all(format!("{}\r\n", command).as_bytes())
                .await
                .unwrap();
        }

        async fn reply(&mut self) -> String {
            let mut line = String::new();
            self.reader.read_line(&mut line).await.unwrap();
            line.trim_end().to_string()
        }

        async fn command(&mut self, command: &str) -> String {
            self.send(command).await;
            self.reply().await
        }

        async fn login(&mut self) {
            assert_eq!(self.command("USER alice").await, "230 User alice Logged In.");
        }

        async fn pasv(&mut self) -> TcpStream {
            let reply = self.command("PASV").await;
            assert!(reply.starts_with("227 "), "{}", reply);
            let inner = &reply[reply.find('(').unwrap() + 1..reply.find(')').unwrap()];
            let fields: Vec<u16> = inner.split(',').map(|f| f.parse().unwrap()).collect();
            let port = fields[4] * 256 + fields[5];
            TcpStream::connect(("127.0.0.1", port)).await.unwrap()
        }

        async fn upload(&mut self, command: &str, payload: &[u8]) -> String {
            let mut data = self.pasv().await;
            self.send(command).await;
            assert_eq!(self.reply().await, "150 Connection accepted.");
            data.write_all(payload).await.unwrap();
            data.shutdown().await.unwrap();
            drop(data);
            self.reply().await
        }

        async fn download(&mut self, command: &str) -> (Vec<u8>, String) {
            let mut data = self.pasv().await;
            self.send(command).await;
            assert_eq!(self.reply().await, "150 Connection accepted.");
            let mut received = Vec::new();
            data.read_to_end(&mut received).await.unwrap();
            (received, self.reply().await)
        }
    }

    async fn start(
        data_start_port: u16,
    ) -> (std::net::SocketAddr, Arc<ServerState>, Arc<MemoryObjectStore>) {
        start_with(data_start_port, |_| {}).await
    }

    async fn start_with(
        data_start_port: u16,
        configure: impl FnOnce(&mut Config),
    ) -> (std::net::SocketAddr, Arc<ServerState>, Arc<MemoryObjectStore>) {
        let mut config = Config::default();
        config.database.backend = StorageBackend::Memory;
        config.database.pool_size = 2;
        config.server.data_start_port = data_start_port;
        config.server.data_ports_range = 4;
        config.server.timeout_seconds = 5;
        config.liveness.session_ttl_ticks = 1;
        configure(&mut config);

        let store = Arc::new(MemoryObjectStore::new(2).await.unwrap());
        let shared: Arc<dyn ObjectStore> = Arc::clone(&store) as Arc<dyn ObjectStore>;
        let state = ServerState::new(config, shared).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::clone(&state)));
        (addr, state, store)
    }

    #[tokio::test]
    async fn test_store_retrieve_delete_session() {
        let (addr, state, store) = start(43200).await;
        let mut client = Client::connect(addr).await;
        client.login().await;

        assert_eq!(
            client.upload("STOR report.txt", b"0123456789").await,
            "226 Transfer complete."
        );
        assert_eq!(client.command("SIZE report.txt").await, "213 10");

        let (received, reply) = client.download("RETR report.txt").await;
        assert_eq!(received, b"0123456789");
        assert_eq!(reply, "226 Transfer complete.");

        assert_eq!(
            client.command("DELE report.txt").await,
            "250 file report.txt deleted succesfully"
        );
        assert_eq!(
            client.command("SIZE report.txt").await,
            "550 File report.txt not found"
        );
        assert_eq!(store.row_counts(), (0, 0, 0, 0));
        assert_eq!(state.ports.available(), state.ports.capacity());

        assert_eq!(client.command("QUIT").await, "221 Goodbye.");
    }

    #[tokio::test]
    async fn test_transfer_without_data_connection() {
        let (addr, _state, _store) = start(43210).await;
        let mut client = Client::connect(addr).await;
        client.login().await;
        assert_eq!(
            client.command("RETR missing.bin").await,
            "550 File missing.bin not found."
        );
        assert_eq!(
            client.command("STOR report.txt").await,
            "503 Bad sequence of commands."
        );
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let (addr, state, store) = start(43220).await;
        let mut client = Client::connect(addr).await;
        client.login().await;

        let reply = client.upload("STOR empty.bin", b"").await;
        assert_eq!(
            reply,
            "550 Can't store file. Transferred bytes are less than 1"
        );
        assert_eq!(store.row_counts(), (0, 0, 0, 0));
        assert_eq!(store.pool().available(), store.pool().capacity());
        assert_eq!(state.ports.available(), state.ports.capacity());
    }

    #[tokio::test]
    async fn test_resume_append_and_unique_names() {
        let (addr, _state, _store) = start(43230).await;
        let mut client = Client::connect(addr).await;
        client.login().await;

        client.upload("STOR log.txt", b"hello world").await;
        assert_eq!(client.command("REST 6").await, "350 Restarting at 6.");
        let (received, _) = client.download("RETR log.txt").await;
        assert_eq!(received, b"world");

        assert_eq!(client.command("REST 5").await, "350 Restarting at 5.");
        assert_eq!(
            client.upload("STOR log.txt", b", rust").await,
            "226 Transfer complete."
        );
        assert_eq!(client.command("SIZE log.txt").await, "213 11");

        assert_eq!(
            client.upload("APPE log.txt", b"!!").await,
            "226 Transfer complete."
        );
        let (received, _) = client.download("RETR log.txt").await;
        assert_eq!(received, b"hello, rust!!");

        let reply = client.upload("STOU", b"abc").await;
        let name = reply
            .strip_prefix("226 ")
            .and_then(|rest| rest.strip_suffix(" Transfer complete."))
            .unwrap()
            .to_string();
        assert_eq!(client.command(&format!("SIZE {}", name)).await, "213 3");
    }

    #[tokio::test]
    async fn test_active_mode_upload() {
        let (addr, _state, _store) = start(43240).await;
        let mut client = Client::connect(addr).await;
        client.login().await;

        let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = data_listener.local_addr().unwrap().port();
        let command = format!("PORT 127,0,0,1,{},{}", port >> 8, port & 0xff);
        assert_eq!(client.command(&command).await, "200 PORT command successful.");
        let (mut data, _) = data_listener.accept().await.unwrap();

        client.send("STOR active.bin").await;
        assert_eq!(client.reply().await, "150 Connection accepted.");
        data.write_all(b"active").await.unwrap();
        data.shutdown().await.unwrap();
        drop(data);
        assert_eq!(client.reply().await, "226 Transfer complete.");
        assert_eq!(client.command("SIZE active.bin").await, "213 6");
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let (addr, _state, _store) = start(43250).await;
        let mut client = Client::connect(addr).await;

        assert_eq!(client.command("PWD").await, "332 authentication required");
        assert_eq!(client.command("NOOP").await, "200 NOOP Command Successful.");
        client.login().await;
        assert_eq!(client.command("EPSV").await, "502 Command not implemented.");
        assert_eq!(client.command("MKD docs").await, "502 Command not implemented.");
        assert_eq!(client.command("TYPE E").await, "550 Error - unknown binary mode.");
        assert_eq!(client.command("TYPE I").await, "200 Binary transfer mode active.");
        assert_eq!(client.command("MODE Z").await, "502 MODE Z non-implemented.");
        assert_eq!(client.command("REST abc").await, "501 Syntax error in arguments.");
        assert_eq!(client.command("CWD /docs").await, "250 CWD command successful.");
        assert_eq!(
            client.command("XPWD").await,
            "257 \"/docs\" is current directory."
        );
    }

    #[tokio::test]
    async fn test_idle_session_is_evicted() {
        let (addr, state, _store) = start(43260).await;
        let mut client = Client::connect(addr).await;

        let mut evicted = 0;
        for _ in 0..50 {
            evicted += state.liveness.on_timer().await;
            if evicted > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(evicted, 1);
        assert_eq!(
            client.reply().await,
            "421 Idle session expired, closing control connection."
        );
    }

    #[tokio::test]
    async fn test_failed_metadata_insert_rolls_back_the_upload() {
        let (addr, state, store) = start(43270).await;
        let mut client = Client::connect(addr).await;
        client.login().await;

        store.reject_inserts(true);
        let reply = client.upload("STOR broken.bin", b"payload").await;
        assert!(reply.starts_with("550 database error"), "{}", reply);
        assert_eq!(store.row_counts(), (0, 0, 0, 0));
        assert_eq!(store.pool().available(), store.pool().capacity());
        assert_eq!(state.ports.available(), state.ports.capacity());

        store.reject_inserts(false);
        assert_eq!(
            client.upload("STOR broken.bin", b"payload").await,
            "226 Transfer complete."
        );
        assert_eq!(store.row_counts(), (1, 1, 1, 1));
    }

    #[tokio::test]
    async fn test_retrieve_aborted_by_the_client_returns_the_data_port() {
        let (addr, state, store) = start(43280).await;
        let mut client = Client::connect(addr).await;
        client.login().await;

        let payload = vec![b'z'; 4 * crate::constants::FRAME_SIZE];
        assert_eq!(
            client.upload("STOR huge.bin", &payload).await,
            "226 Transfer complete."
        );

        let data = client.pasv().await;
        client.send("RETR huge.bin").await;
        assert_eq!(client.reply().await, "150 Connection accepted.");
        drop(data);

        let reply = client.reply().await;
        assert!(reply.starts_with("550 Can't retrieve File."), "{}", reply);
        assert_eq!(state.ports.available(), state.ports.capacity());
        assert_eq!(store.pool().available(), store.pool().capacity());
        assert_eq!(store.row_counts(), (1, 1, 1, 1));
        assert_eq!(
            client.command("SIZE huge.bin").await,
            format!("213 {}", payload.len())
        );
    }

    #[tokio::test]
    async fn test_silent_client_times_out() {
        let (addr, state, _store) = start_with(43290, |config| {
            config.server.timeout_seconds = 1;
            config.liveness.session_ttl_ticks = 1000;
        })
        .await;
        let mut client = Client::connect(addr).await;

        let reply = tokio::time::timeout(std::time::Duration::from_secs(5), client.reply())
            .await
            .unwrap();
        assert_eq!(reply, "421 Timeout, closing control connection.");
        assert_eq!(client.reply().await, "");
        assert_eq!(state.registry.active(), 0);
    }

    #[tokio::test]
    async fn test_oversized_command_line_is_rejected() {
        let (addr, _state, _store) = start(43300).await;
        let mut client = Client::connect(addr).await;

        let long = "A".repeat(MAX_COMMAND_LINE + 900);
        assert_eq!(client.command(&long).await, "500 Command line too long.");
        assert_eq!(client.command("NOOP").await, "200 NOOP Command Successful.");
    }
}
