use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::{Session, TransferMode};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the MODE FTP command. Only stream mode exists.
pub async fn handle_mode_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let response = match arg.split_whitespace().next().map(|s| s.to_uppercase()) {
        None => "501 Invalid number of arguments.",
        Some(mode) if mode == "S" => {
            session.lock().await.transfer_mode = TransferMode::Stream;
            "200 MODE set to S."
        }
        Some(mode) if mode == "Z" => "502 MODE Z non-implemented.",
        Some(_) => "504 Unsupported transfer MODE.",
    };
    send_reply(&writer, response).await
}
