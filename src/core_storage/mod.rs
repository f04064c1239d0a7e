// Transactional object store holding uploaded payloads as large objects
pub mod blob;
pub mod error;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use blob::Blob;
pub use error::StorageError;
pub use memory::MemoryObjectStore;
pub use postgres::PgObjectStore;

/// Handle of a large object inside the store.
pub type Oid = u32;

/// One stored payload: the entry, storage and binary-storage records joined.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub entry_id: Uuid,
    pub name: String,
    pub oid: Oid,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Entry point of a storage backend. Each call to `begin` checks out one
/// database connection for the lifetime of the returned transaction.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StorageError>;
}

/// Unit of work over the store.
///
/// Dropping a transaction that was neither committed nor rolled back discards
/// its changes.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Looks up an object by its external name.
    async fn resolve(&mut self, name: &str) -> Result<Option<StoredObject>, StorageError>;

    /// Every stored object, ordered by name.
    async fn list(&mut self) -> Result<Vec<StoredObject>, StorageError>;

    /// Allocates a new, empty large object.
    async fn create_object(&mut self) -> Result<Oid, StorageError>;

    /// Current length of a large object in bytes.
    async fn object_len(&mut self, oid: Oid) -> Result<u64, StorageError>;

    /// Reads at most `len` bytes starting at `offset`.
    async fn read_object(&mut self, oid: Oid, offset: u64, len: usize)
        -> Result<Blob, StorageError>;

    /// Writes `data` at `offset`, growing the object as needed.
    async fn write_object(&mut self, oid: Oid, offset: u64, data: &[u8])
        -> Result<(), StorageError>;

    /// Inserts the entry, storage and binary-storage rows of one object.
    async fn insert_entry(
        &mut self,
        entry_id: Uuid,
        name: &str,
        oid: Oid,
        size: u64,
    ) -> Result<(), StorageError>;

    async fn update_entry_size(&mut self, entry_id: Uuid, size: u64) -> Result<(), StorageError>;

    /// Unlinks the large object and deletes its three rows.
    async fn delete_entry(&mut self, object: &StoredObject) -> Result<(), StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
