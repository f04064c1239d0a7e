use crate::constants::FRAME_SIZE;
use crate::core_storage::{Oid, StoreTransaction};
use crate::core_transfer::{open_data, rollback_quietly, TransferError};
use crate::helpers::{send_reply, write_fully, ControlWriter};
use crate::server::ServerState;
use crate::session::{Session, SessionStatus};
use log::{error, info};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// RETR: streams a stored object to the client, honouring a pending REST offset.
pub async fn retrieve(
    writer: &ControlWriter,
    state: &ServerState,
    session: &mut Session,
    name: &str,
) -> std::io::Result<()> {
    let offset = session.take_restart_offset();

    let mut tx = match state.store.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            error!("{} RETR {}: {}", writer.id(), name, e);
            return send_reply(writer, &format!("550 Can't retrieve File. {}", e)).await;
        }
    };

    let object = match tx.resolve(name).await {
        Ok(Some(object)) => object,
        Ok(None) => {
            rollback_quietly(tx).await;
            return send_reply(writer, &format!("550 File {} not found.", name)).await;
        }
        Err(e) => {
            rollback_quietly(tx).await;
            return send_reply(writer, &format!("550 Can't retrieve File. {}", e)).await;
        }
    };

    let len = match tx.object_len(object.oid).await {
        Ok(len) if offset > len => {
            rollback_quietly(tx).await;
            let e = TransferError::OffsetBeyondEnd { offset, len };
            return send_reply(writer, &format!("550 Can't retrieve File. {}", e)).await;
        }
        Ok(len) => len,
        Err(e) => {
            rollback_quietly(tx).await;
            return send_reply(writer, &format!("550 Can't retrieve File. {}", e)).await;
        }
    };

    if !open_data(writer, session, state.config.control_timeout()).await? {
        rollback_quietly(tx).await;
        return Ok(());
    }
    session.status = SessionStatus::Downloading;

    let outcome = match session.data.stream() {
        Some(stream) => send_object(tx.as_mut(), object.oid, offset, len, stream).await,
        None => Err(TransferError::NotConnected),
    };

    match outcome {
        Ok(sent) => {
            let committed = tx.commit().await;
            session.close_data_connection();
            match committed {
                Ok(()) => {
                    info!(
                        "{} RETR {} ({:?}): {} bytes from offset {}",
                        writer.id(),
                        name,
                        session.transfer_type,
                        sent,
                        offset
                    );
                    send_reply(writer, "226 Transfer complete.").await
                }
                Err(e) => send_reply(writer, &format!("550 Can't retrieve File. {}", e)).await,
            }
        }
        Err(e) => {
            error!("{} RETR {} aborted: {}", writer.id(), name, e);
            rollback_quietly(tx).await;
            session.close_data_connection();
            send_reply(writer, &format!("550 Can't retrieve File. {}", e)).await
        }
    }
}

/// Copies bytes `[offset, len)` of a large object to `out`, one frame at a time.
pub async fn send_object<W>(
    tx: &mut dyn StoreTransaction,
    oid: Oid,
    offset: u64,
    len: u64,
    out: &mut W,
) -> Result<u64, TransferError>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut position = offset;
    while position < len {
        let want = (len - position).min(FRAME_SIZE as u64) as usize;
        let frame = tx.read_object(oid, position, want).await?;
        if frame.is_empty() {
            break;
        }
        write_fully(out, frame.as_slice()).await?;
        position += frame.len() as u64;
    }
    out.flush().await?;
    Ok(position - offset)
}
