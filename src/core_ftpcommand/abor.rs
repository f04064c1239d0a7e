use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn handle_abor_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    let mut session = session.lock().await;
    if session.is_transferring() {
        info!("{} aborting {:?}", writer.id(), session.status);
        session.close_data_connection();
        send_reply(&writer, "426 Previous command has been finished abnormally.").await?;
    }
    send_reply(&writer, "226 ABOR command successful.").await
}
