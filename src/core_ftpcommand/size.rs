use crate::core_ftpcommand::utils::lookup_object;
use crate::helpers::{file_name_arg, send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use log::error;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the SIZE FTP command.
///
/// Replies with the recorded byte count of the object stored under `arg`.
///
/// # Arguments
///
/// * `writer` - The control connection to reply on.
/// * `state` - Shared server state holding the object store.
/// * `_session` - The client's session (not used in this command).
/// * `arg` - The name of the object.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_size_command(
    writer: ControlWriter,
    state: Arc<ServerState>,
    _session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let Some(name) = file_name_arg(&arg) else {
        return send_reply(&writer, "501 Syntax error in arguments.").await;
    };

    match lookup_object(&state, &name).await {
        Ok(Some(object)) => send_reply(&writer, &format!("213 {}", object.size)).await,
        Ok(None) => send_reply(&writer, &format!("550 File {} not found", name)).await,
        Err(e) => {
            error!("{} SIZE {}: {}", writer.id(), name, e);
            send_reply(&writer, &e.to_ftp_response()).await
        }
    }
}
