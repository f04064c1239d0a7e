use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::{Session, SessionStatus};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the REST FTP command.
///
/// The offset applies to the next RETR or STOR and is cleared by it.
pub async fn handle_rest_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let mut session = session.lock().await;
    let offset = match arg.trim().parse::<u64>() {
        Ok(offset) if session.status == SessionStatus::Waiting => offset,
        _ => return send_reply(&writer, "501 Syntax error in arguments.").await,
    };
    session.restart_offset = offset;
    send_reply(&writer, &format!("350 Restarting at {}.", offset)).await
}
