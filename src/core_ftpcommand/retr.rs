use crate::core_transfer::retrieve;
use crate::helpers::{file_name_arg, send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the RETR FTP command.
///
/// The session stays locked for the whole download; the control loop keeps
/// the connection alive while the status is Downloading.
pub async fn handle_retr_command(
    writer: ControlWriter,
    state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let Some(name) = file_name_arg(&arg) else {
        return send_reply(&writer, "501 Syntax error in arguments.").await;
    };

    let mut session = session.lock().await;
    retrieve::retrieve(&writer, &state, &mut session, &name).await
}
