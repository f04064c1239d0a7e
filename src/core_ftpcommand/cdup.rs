use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles CDUP and XCUP: back to the root label.
pub async fn handle_cdup_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    session.lock().await.working_dir = String::from("/");
    send_reply(&writer, "250 CDUP command successful.").await
}
