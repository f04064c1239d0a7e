// Transfer engine: moves payloads between data connections and the object store
pub mod delete;
pub mod error;
pub mod listing;
pub mod retrieve;
pub mod store;

pub use error::TransferError;

use crate::core_storage::StoreTransaction;
use crate::helpers::{send_reply, ControlWriter};
use crate::session::Session;
use log::warn;
use std::time::Duration;

/// Opens the data connection and announces it to the client.
///
/// Returns `Ok(false)` when the connection could not be opened; the client has
/// already been told why.
async fn open_data(
    writer: &ControlWriter,
    session: &mut Session,
    timeout: Duration,
) -> std::io::Result<bool> {
    match session.open_data_connection(timeout).await {
        Ok(()) => {
            send_reply(writer, "150 Connection accepted.").await?;
            Ok(true)
        }
        Err(e) => {
            warn!("{} data connection: {}", writer.id(), e);
            send_reply(writer, &e.to_ftp_response()).await?;
            Ok(false)
        }
    }
}

pub(crate) async fn rollback_quietly(tx: Box<dyn StoreTransaction>) {
    if let Err(e) = tx.rollback().await {
        warn!("Rollback failed: {}", e);
    }
}
