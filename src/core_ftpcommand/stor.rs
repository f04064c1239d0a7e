use crate::core_transfer::store::{self, UploadKind};
use crate::helpers::{file_name_arg, send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Handles the STOR FTP command.
///
/// # Arguments
///
/// * `writer` - The control connection to reply on.
/// * `state` - Shared server state holding the object store.
/// * `session` - The session owning the data connection.
/// * `arg` - The name to store the upload under. Only the last path
///   component is kept.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_stor_command(
    writer: ControlWriter,
    state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    upload(writer, state, session, UploadKind::Store, file_name_arg(&arg)).await
}

/// Handles the APPE FTP command: like STOR, but the bytes land after the
/// current end of the object.
pub async fn handle_appe_command(
    writer: ControlWriter,
    state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    upload(writer, state, session, UploadKind::Append, file_name_arg(&arg)).await
}

/// Handles the STOU FTP command. The name is generated here and returned in
/// the final reply.
pub async fn handle_stou_command(
    writer: ControlWriter,
    state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    let name = Uuid::new_v4().to_string();
    upload(writer, state, session, UploadKind::Unique, Some(name)).await
}

async fn upload(
    writer: ControlWriter,
    state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    kind: UploadKind,
    name: Option<String>,
) -> Result<(), std::io::Error> {
    let Some(name) = name else {
        return send_reply(&writer, "501 Syntax error in arguments.").await;
    };

    let mut session = session.lock().await;
    store::store(&writer, &state, &mut session, kind, &name).await
}
