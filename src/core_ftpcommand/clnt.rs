use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use log::debug;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the CLNT FTP command: the client announces its software name.
pub async fn handle_clnt_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    _session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    debug!("{} client software: {}", writer.id(), arg);
    send_reply(&writer, "200 Ok.").await
}
