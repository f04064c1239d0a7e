use crate::constants::FRAME_SIZE;
use crate::core_storage::{Oid, StorageError, StoreTransaction, StoredObject};
use crate::core_transfer::{open_data, rollback_quietly, TransferError};
use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use crate::session::{Session, SessionStatus};
use log::{debug, error, info, warn};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// STOR: create, replace, or resume at the REST offset.
    Store,
    /// APPE: write after the end of an existing object.
    Append,
    /// STOU: create under a server-chosen name.
    Unique,
}

/// Where the uploaded bytes go.
#[derive(Debug)]
enum UploadTarget {
    Fresh {
        oid: Oid,
    },
    Existing {
        object: StoredObject,
        prior_len: u64,
        offset: u64,
    },
}

impl UploadTarget {
    fn oid(&self) -> Oid {
        match self {
            UploadTarget::Fresh { oid } => *oid,
            UploadTarget::Existing { object, .. } => object.oid,
        }
    }

    fn write_offset(&self) -> u64 {
        match self {
            UploadTarget::Fresh { .. } => 0,
            UploadTarget::Existing { offset, .. } => *offset,
        }
    }
}

/// STOR, APPE and STOU: receives the data connection into a large object and
/// records it under `name`.
pub async fn store(
    writer: &ControlWriter,
    state: &ServerState,
    session: &mut Session,
    kind: UploadKind,
    name: &str,
) -> std::io::Result<()> {
    let offset = session.take_restart_offset();

    let mut tx = match state.store.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            error!("{} {:?} {}: {}", writer.id(), kind, name, e);
            return send_reply(writer, &format!("550 Can't store file. {}", e)).await;
        }
    };

    let target = match plan_upload(tx.as_mut(), kind, name, offset).await {
        Ok(target) => target,
        Err(e) => {
            warn!("{} {:?} {}: {}", writer.id(), kind, name, e);
            rollback_quietly(tx).await;
            return send_reply(writer, &e.to_ftp_response()).await;
        }
    };
    debug!("{} upload of {} into {:?}", writer.id(), name, target);

    if !open_data(writer, session, state.config.control_timeout()).await? {
        rollback_quietly(tx).await;
        return Ok(());
    }
    session.status = SessionStatus::Uploading;

    let received = match session.data.stream() {
        Some(stream) => {
            receive_object(
                tx.as_mut(),
                target.oid(),
                target.write_offset(),
                stream,
                state.config.server.upload_buffer_size,
            )
            .await
        }
        None => Err(TransferError::NotConnected),
    };

    let recorded = match received {
        Ok(0) => Err(TransferError::Empty),
        Ok(written) => record_upload(tx.as_mut(), &target, name, written)
            .await
            .map(|size| (written, size)),
        Err(e) => Err(e),
    };

    let (written, size) = match recorded {
        Ok(done) => done,
        Err(e) => {
            warn!("{} {:?} {} failed: {}", writer.id(), kind, name, e);
            rollback_quietly(tx).await;
            session.close_data_connection();
            return send_reply(writer, &e.to_ftp_response()).await;
        }
    };

    let committed = tx.commit().await;
    session.close_data_connection();
    if let Err(e) = committed {
        error!("{} commit of {} failed: {}", writer.id(), name, e);
        return send_reply(writer, &format!("550 {}", e)).await;
    }

    info!(
        "{} {:?} {}: {} bytes received, {} bytes stored",
        writer.id(),
        kind,
        name,
        written,
        size
    );
    match kind {
        UploadKind::Unique => send_reply(writer, &format!("226 {} Transfer complete.", name)).await,
        _ => send_reply(writer, "226 Transfer complete.").await,
    }
}

async fn plan_upload(
    tx: &mut dyn StoreTransaction,
    kind: UploadKind,
    name: &str,
    offset: u64,
) -> Result<UploadTarget, TransferError> {
    let existing = match kind {
        UploadKind::Unique => None,
        _ => tx.resolve(name).await?,
    };

    match (kind, existing) {
        (UploadKind::Append, Some(object)) => {
            let prior_len = tx.object_len(object.oid).await?;
            Ok(UploadTarget::Existing {
                object,
                prior_len,
                offset: prior_len,
            })
        }
        (UploadKind::Store, existing) if offset > 0 => {
            let Some(object) = existing else {
                return Err(TransferError::OffsetBeyondEnd { offset, len: 0 });
            };
            let prior_len = tx.object_len(object.oid).await?;
            if offset > prior_len {
                return Err(TransferError::OffsetBeyondEnd {
                    offset,
                    len: prior_len,
                });
            }
            Ok(UploadTarget::Existing {
                object,
                prior_len,
                offset,
            })
        }
        (_, existing) => {
            if let Some(old) = existing {
                debug!("Replacing {} (large object {})", old.name, old.oid);
                tx.delete_entry(&old).await?;
            }
            Ok(UploadTarget::Fresh {
                oid: tx.create_object().await?,
            })
        }
    }
}

/// Writes the metadata rows of a finished upload. Returns the stored size.
async fn record_upload(
    tx: &mut dyn StoreTransaction,
    target: &UploadTarget,
    name: &str,
    written: u64,
) -> Result<u64, TransferError> {
    match target {
        UploadTarget::Fresh { oid } => {
            tx.insert_entry(Uuid::new_v4(), name, *oid, written).await?;
            Ok(written)
        }
        UploadTarget::Existing {
            object,
            prior_len,
            offset,
        } => {
            let size = (*prior_len).max(offset + written);
            tx.update_entry_size(object.entry_id, size).await?;
            Ok(size)
        }
    }
}

/// Reads `input` until EOF into large object `oid` starting at `offset`.
///
/// Socket reads of at most `chunk_size` bytes are gathered into frames of
/// `FRAME_SIZE` before each write to the store. Returns the byte count read.
pub async fn receive_object<R>(
    tx: &mut dyn StoreTransaction,
    oid: Oid,
    offset: u64,
    input: &mut R,
    chunk_size: usize,
) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut frame: Vec<u8> = Vec::with_capacity(FRAME_SIZE);
    let mut chunk = vec![0u8; chunk_size.clamp(1, FRAME_SIZE)];
    let mut position = offset;
    let mut total = 0u64;

    loop {
        let room = (FRAME_SIZE - frame.len()).min(chunk.len());
        let n = match input.read(&mut chunk[..room]).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        frame.extend_from_slice(&chunk[..n]);
        total += n as u64;

        if frame.len() == FRAME_SIZE {
            flush_frame(tx, oid, &mut position, &mut frame).await?;
        }
    }

    if !frame.is_empty() {
        flush_frame(tx, oid, &mut position, &mut frame).await?;
    }
    Ok(total)
}

async fn flush_frame(
    tx: &mut dyn StoreTransaction,
    oid: Oid,
    position: &mut u64,
    frame: &mut Vec<u8>,
) -> Result<(), StorageError> {
    tx.write_object(oid, *position, frame).await?;
    *position += frame.len() as u64;
    frame.clear();
    Ok(())
}
