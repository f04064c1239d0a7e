use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn handle_stru_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    _session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let response = match arg.split_whitespace().next() {
        None => "501 Invalid number of arguments.",
        Some(structure) if structure.eq_ignore_ascii_case("F") => {
            "504 STRU failed. Parameter not implemented."
        }
        Some(_) => "200 STRU Command Successful.",
    };
    send_reply(&writer, response).await
}
