use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn handle_opts_command(
    writer: ControlWriter,
    _state: Arc<ServerState>,
    _session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let response = match arg.split_whitespace().next() {
        None => "501 Invalid number of arguments.",
        Some(option) if option.eq_ignore_ascii_case("utf8") => {
            "202 UTF8 mode is always enabled. No need to send this command."
        }
        Some(_) => "501 Option not understood.",
    };
    send_reply(&writer, response).await
}
