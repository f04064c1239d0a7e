use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles CWD and XCWD. The working directory is a label, nothing is checked.
pub async fn handle_cwd_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.is_empty() {
        return send_reply(&writer, "501 Invalid number of arguments.").await;
    }
    session.lock().await.working_dir = arg;
    send_reply(&writer, "250 CWD command successful.").await
}
