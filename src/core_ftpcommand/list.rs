use crate::constants::SERVER_NAME;
use crate::core_transfer::listing::{self, ListingKind};
use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the LIST FTP command: long listing of every stored object.
///
/// # Arguments
///
/// * `writer` - The control connection to reply on.
/// * `state` - Shared server state holding the object store.
/// * `session` - The session owning the data connection.
/// * `arg` - Listing flags (`-a`, `-d`, `-F`, `-l`); anything else is ignored.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_list_command(
    writer: ControlWriter,
    state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let mut session = session.lock().await;
    listing::list(&writer, &state, &mut session, ListingKind::List, &arg).await
}

/// Handles the NLST FTP command: names only, unless `-l` is given.
pub async fn handle_nlst_command(
    writer: ControlWriter,
    state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let mut session = session.lock().await;
    listing::list(&writer, &state, &mut session, ListingKind::Nlst, &arg).await
}

/// Handles the STAT FTP command. Without arguments it reports the server
/// status, otherwise it behaves like LIST framed by 213 replies.
pub async fn handle_stat_command(
    writer: ControlWriter,
    state: Arc<ServerState>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.is_empty() {
        return send_reply(&writer, &format!("211 {} FTP server status: OK", SERVER_NAME)).await;
    }
    let mut session = session.lock().await;
    listing::list(&writer, &state, &mut session, ListingKind::Stat, &arg).await
}
