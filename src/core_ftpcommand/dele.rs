use crate::core_transfer::delete;
use crate::helpers::{file_name_arg, send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn handle_dele_command(
    writer: ControlWriter,
    state: Arc<ServerState>,
    _session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let Some(name) = file_name_arg(&arg) else {
        return send_reply(&writer, "501 Syntax error in arguments.").await;
    };
    delete::delete(&writer, &state, &name).await
}
