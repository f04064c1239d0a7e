use crate::helpers::{send_multiline, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the FEAT FTP command.
///
/// Lists the extensions on top of RFC 959 this server understands.
pub async fn handle_feat_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    _session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    send_multiline(
        &writer,
        &["211-Features:", " CLNT", " MDTM", " REST STREAM", " SIZE", "211 End"],
    )
    .await
}
