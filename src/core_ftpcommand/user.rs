use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the USER FTP command.
///
/// The argument is an opaque client id; there is no password check, giving
/// one is enough to be logged in.
///
/// # Arguments
///
/// * `writer` - The control connection to reply on.
/// * `_state` - Shared server state (not used in this command).
/// * `session` - The session to log in.
/// * `arg` - The client id.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_user_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let mut session = session.lock().await;
    if session.logged_in {
        return send_reply(&writer, "332 User already logged in.").await;
    }

    let Some(client_id) = arg.split_whitespace().next() else {
        return send_reply(&writer, "501 Invalid number of arguments.").await;
    };

    session.logged_in = true;
    session.client_id = Some(client_id.to_string());
    info!("{} logged in as {}", writer.id(), client_id);

    send_reply(&writer, &format!("230 User {} Logged In.", client_id)).await
}
