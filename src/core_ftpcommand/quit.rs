use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::{Session, SessionStatus};
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the QUIT FTP command.
///
/// Marks the session disconnected; the control loop closes the connection
/// once the reply is out.
pub async fn handle_quit_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    info!("{} Received QUIT command. Closing connection.", writer.id());
    {
        let mut session = session.lock().await;
        session.close_data_connection();
        session.status = SessionStatus::Disconnected;
    }
    send_reply(&writer, "221 Goodbye.").await
}
