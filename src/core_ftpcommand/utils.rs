use crate::core_storage::{StorageError, StoredObject};
use crate::core_transfer::rollback_quietly;
use crate::server::ServerState;

/// Resolves `name` in a short read transaction.
pub async fn lookup_object(
    state: &ServerState,
    name: &str,
) -> Result<Option<StoredObject>, StorageError> {
    let mut tx = state.store.begin().await?;
    match tx.resolve(name).await {
        Ok(object) => {
            tx.commit().await?;
            Ok(object)
        }
        Err(e) => {
            rollback_quietly(tx).await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core_storage::MemoryObjectStore;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_lookup_object() {
        let store = Arc::new(MemoryObjectStore::new(1).await.unwrap());
        let mut config = Config::default();
        config.server.data_start_port = 43100;
        config.server.data_ports_range = 2;
        let state = ServerState::new(config, store).unwrap();

        let mut tx = state.store.begin().await.unwrap();
        let oid = tx.create_object().await.unwrap();
        tx.write_object(oid, 0, b"abc").await.unwrap();
        tx.insert_entry(Uuid::new_v4(), "a.txt", oid, 3).await.unwrap();
        tx.commit().await.unwrap();

        let found = lookup_object(&state, "a.txt").await.unwrap().unwrap();
        assert_eq!(found.size, 3);
        assert!(lookup_object(&state, "missing.txt").await.unwrap().is_none());
    }
}
