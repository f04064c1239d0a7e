use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the PASS FTP command. Passwords are not checked.
pub async fn handle_pass_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    let logged_in = session.lock().await.logged_in;
    let response = if logged_in {
        "202 Command not implemented, superfluous at this site."
    } else {
        "503 Login with USER first."
    };
    send_reply(&writer, response).await
}
