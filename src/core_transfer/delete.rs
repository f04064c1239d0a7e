use crate::core_storage::StorageError;
use crate::core_transfer::rollback_quietly;
use crate::helpers::{send_reply, ControlWriter};
use crate::server::ServerState;
use log::{info, warn};

/// DELE: unlinks the large object and removes its three rows.
pub async fn delete(writer: &ControlWriter, state: &ServerState, name: &str) -> std::io::Result<()> {
    let mut tx = match state.store.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            return send_reply(writer, &format!("550 Can't delete file {}. error: {}", name, e))
                .await;
        }
    };

    let outcome = async {
        let Some(object) = tx.resolve(name).await? else {
            return Ok(false);
        };
        tx.delete_entry(&object).await?;
        Ok::<_, StorageError>(true)
    }
    .await;

    match outcome {
        Ok(true) => match tx.commit().await {
            Ok(()) => {
                info!("{} deleted {}", writer.id(), name);
                send_reply(writer, &format!("250 file {} deleted succesfully", name)).await
            }
            Err(e) => {
                send_reply(writer, &format!("550 Can't delete file {}. error: {}", name, e)).await
            }
        },
        Ok(false) => {
            rollback_quietly(tx).await;
            send_reply(writer, &format!("550 File {} not found", name)).await
        }
        Err(e) => {
            warn!("{} DELE {}: {}", writer.id(), name, e);
            rollback_quietly(tx).await;
            send_reply(writer, &format!("550 Can't delete file {}. error: {}", name, e)).await
        }
    }
}
