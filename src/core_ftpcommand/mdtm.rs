use crate::core_ftpcommand::utils::lookup_object;
use crate::helpers::{file_name_arg, send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use log::error;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the MDTM FTP command. Objects are never modified in place by name,
/// so the creation time is reported.
pub async fn handle_mdtm_command(
    writer: ControlWriter,
    state: Arc<ServerState>,
    _session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let Some(name) = file_name_arg(&arg) else {
        return send_reply(&writer, "501 Syntax error in arguments.").await;
    };

    match lookup_object(&state, &name).await {
        Ok(Some(object)) => {
            let stamp = object.created_at.format("%Y%m%d%H%M%S");
            send_reply(&writer, &format!("213 {}", stamp)).await
        }
        Ok(None) => send_reply(&writer, &format!("550 File {} not found", name)).await,
        Err(e) => {
            error!("{} MDTM {}: {}", writer.id(), name, e);
            send_reply(&writer, &e.to_ftp_response()).await
        }
    }
}
