use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::{Session, TransferType};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the TYPE FTP command.
///
/// Only ASCII and binary are served; EBCDIC is recognised but refused like
/// any other representation. Payloads are always stored byte for byte.
///
/// # Arguments
///
/// * `writer` - The control connection to reply on.
/// * `_state` - Shared server state (not used in this command).
/// * `session` - The session whose transfer type changes.
/// * `arg` - The argument specifying the transfer type.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_type_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let Some(code) = arg.split_whitespace().next() else {
        return send_reply(&writer, "501 Invalid number of arguments.").await;
    };

    let response = match TransferType::from_code(code) {
        Some(TransferType::Ascii) => {
            session.lock().await.transfer_type = TransferType::Ascii;
            "200 ASCII transfer mode active."
        }
        Some(TransferType::Binary) => {
            session.lock().await.transfer_type = TransferType::Binary;
            "200 Binary transfer mode active."
        }
        Some(TransferType::Ebcdic) | None => "550 Error - unknown binary mode.",
    };

    send_reply(&writer, response).await
}
