use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the ALLO FTP command. Large objects grow on demand, nothing to reserve.
pub async fn handle_allo_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    _session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    send_reply(&writer, "200 ALLO Command Successful.").await
}
