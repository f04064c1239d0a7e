// In-process backend with the same transactional behaviour as PostgreSQL:
// a transaction reads committed rows, stages its own writes per key and
// publishes them on commit unless another commit changed the same keys.
use crate::core_db::{DbConnection, DbPool};
use crate::core_storage::{Blob, ObjectStore, Oid, StorageError, StoreTransaction, StoredObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU32, Ordering};
#[cfg(test)]
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Stand-in for a database session; only its checkout is tracked.
pub struct MemoryConnection;

#[derive(Debug, Clone, PartialEq)]
struct EntryRow {
    size: u64,
    created_at: DateTime<Utc>,
}

/// Committed rows. Payloads are shared with open transactions until one of
/// them writes to its copy.
#[derive(Default)]
struct MemoryState {
    objects: HashMap<Oid, Arc<Vec<u8>>>,
    entries: HashMap<Uuid, EntryRow>,
    names: HashMap<String, Uuid>,
    bins: HashMap<Uuid, Oid>,
}

/// A key as first seen by the transaction and its staged value.
struct Slot<V> {
    seen: Option<V>,
    value: Option<V>,
    dirty: bool,
}

struct Staged<K, V> {
    slots: HashMap<K, Slot<V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Staged<K, V> {
    fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    fn get(&self, live: &HashMap<K, V>, key: &K) -> Option<V> {
        match self.slots.get(key) {
            Some(slot) => slot.value.clone(),
            None => live.get(key).cloned(),
        }
    }

    /// Pins the committed value of `key` so a later commit can tell whether
    /// somebody else replaced it in between.
    fn pin(&mut self, live: &HashMap<K, V>, key: &K) -> &mut Slot<V> {
        self.slots.entry(key.clone()).or_insert_with(|| {
            let seen = live.get(key).cloned();
            Slot {
                value: seen.clone(),
                seen,
                dirty: false,
            }
        })
    }

    fn set(&mut self, live: &HashMap<K, V>, key: &K, value: Option<V>) {
        let slot = self.pin(live, key);
        slot.value = value;
        slot.dirty = true;
    }

    /// First written key whose committed value moved since it was pinned.
    fn conflict(&self, live: &HashMap<K, V>, same: impl Fn(&V, &V) -> bool) -> Option<&K> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.dirty)
            .find(|(key, slot)| match (&slot.seen, live.get(*key)) {
                (None, None) => false,
                (Some(seen), Some(current)) => !same(seen, current),
                _ => true,
            })
            .map(|(key, _)| key)
    }

    fn publish(&mut self, live: &mut HashMap<K, V>) {
        for (key, slot) in self.slots.drain() {
            if !slot.dirty {
                continue;
            }
            match slot.value {
                Some(value) => live.insert(key, value),
                None => live.remove(&key),
            };
        }
    }
}

struct Shared {
    state: Mutex<MemoryState>,
    next_oid: AtomicU32,
    #[cfg(test)]
    reject_inserts: AtomicBool,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct MemoryObjectStore {
    shared: Arc<Shared>,
    pool: DbPool<MemoryConnection>,
}

impl MemoryObjectStore {
    pub async fn new(pool_size: usize) -> Result<Self, StorageError> {
        let pool = DbPool::connect(pool_size, |_| async {
            Ok::<_, StorageError>(MemoryConnection)
        })
        .await?;

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(MemoryState::default()),
                next_oid: AtomicU32::new(16384),
                #[cfg(test)]
                reject_inserts: AtomicBool::new(false),
            }),
            pool,
        })
    }

    #[cfg(test)]
    pub fn pool(&self) -> &DbPool<MemoryConnection> {
        &self.pool
    }

    /// Row counts of the entry, storage and binary-storage tables plus the
    /// number of live large objects.
    #[cfg(test)]
    pub fn row_counts(&self) -> (usize, usize, usize, usize) {
        let state = self.shared.state();
        (
            state.entries.len(),
            state.names.len(),
            state.bins.len(),
            state.objects.len(),
        )
    }

    /// Makes every following `insert_entry` fail like a broken database.
    #[cfg(test)]
    pub fn reject_inserts(&self, reject: bool) {
        self.shared.reject_inserts.store(reject, Ordering::SeqCst);
    }

    /// Handles currently held on the committed payload of `oid`.
    #[cfg(test)]
    fn payload_handles(&self, oid: Oid) -> usize {
        self.shared
            .state()
            .objects
            .get(&oid)
            .map_or(0, Arc::strong_count)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StorageError> {
        let conn = self.pool.get().await?;
        trace!("In-memory transaction, {} connections left", self.pool.available());
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            objects: Staged::new(),
            entries: Staged::new(),
            names: Staged::new(),
            bins: Staged::new(),
            conn: Some(conn),
        }))
    }
}

pub struct MemoryTransaction {
    shared: Arc<Shared>,
    objects: Staged<Oid, Arc<Vec<u8>>>,
    entries: Staged<Uuid, EntryRow>,
    names: Staged<String, Uuid>,
    bins: Staged<Uuid, Oid>,
    conn: Option<DbConnection<MemoryConnection>>,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.conn.is_none() {
            return Err(StorageError::TransactionClosed);
        }
        Ok(())
    }

    fn joined(&self, live: &MemoryState, name: &str, entry_id: Uuid) -> Option<StoredObject> {
        let entry = self.entries.get(&live.entries, &entry_id)?;
        let oid = self.bins.get(&live.bins, &entry_id)?;
        Some(StoredObject {
            entry_id,
            name: name.to_string(),
            oid,
            size: entry.size,
            created_at: entry.created_at,
        })
    }

    /// Payload of `oid` as this transaction sees it, pinned for conflict
    /// detection.
    fn payload(&mut self, oid: Oid) -> Result<Arc<Vec<u8>>, StorageError> {
        let live = self.shared.state();
        self.objects
            .pin(&live.objects, &oid)
            .value
            .clone()
            .ok_or(StorageError::MissingObject(oid))
    }

    fn publish(&mut self) -> Result<(), StorageError> {
        let mut live = self.shared.state();

        if let Some(name) = self.names.conflict(&live.names, |a, b| a == b) {
            return Err(StorageError::DuplicateName(name.clone()));
        }
        if let Some(entry_id) = self
            .entries
            .conflict(&live.entries, |a, b| a == b)
            .or_else(|| self.bins.conflict(&live.bins, |a, b| a == b))
        {
            return Err(StorageError::Conflict(format!("entry {}", entry_id)));
        }
        if let Some(oid) = self.objects.conflict(&live.objects, Arc::ptr_eq) {
            return Err(StorageError::Conflict(format!("large object {}", oid)));
        }

        self.objects.publish(&mut live.objects);
        self.entries.publish(&mut live.entries);
        self.bins.publish(&mut live.bins);
        self.names.publish(&mut live.names);
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn resolve(&mut self, name: &str) -> Result<Option<StoredObject>, StorageError> {
        self.ensure_open()?;
        let live = self.shared.state();
        Ok(self
            .names
            .get(&live.names, &name.to_string())
            .and_then(|entry_id| self.joined(&live, name, entry_id)))
    }

    async fn list(&mut self) -> Result<Vec<StoredObject>, StorageError> {
        self.ensure_open()?;
        let live = self.shared.state();
        let mut names: Vec<(String, Uuid)> = live
            .names
            .iter()
            .filter(|(name, _)| !self.names.slots.contains_key(*name))
            .map(|(name, entry_id)| (name.clone(), *entry_id))
            .collect();
        names.extend(self.names.slots.iter().filter_map(|(name, slot)| {
            slot.value.map(|entry_id| (name.clone(), entry_id))
        }));

        let mut objects: Vec<StoredObject> = names
            .iter()
            .filter_map(|(name, entry_id)| self.joined(&live, name, *entry_id))
            .collect();
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    async fn create_object(&mut self) -> Result<Oid, StorageError> {
        self.ensure_open()?;
        let oid = self.shared.next_oid.fetch_add(1, Ordering::SeqCst);
        let live = self.shared.state();
        self.objects.set(&live.objects, &oid, Some(Arc::new(Vec::new())));
        debug!("Created in-memory object {}", oid);
        Ok(oid)
    }

    async fn object_len(&mut self, oid: Oid) -> Result<u64, StorageError> {
        self.ensure_open()?;
        Ok(self.payload(oid)?.len() as u64)
    }

    async fn read_object(
        &mut self,
        oid: Oid,
        offset: u64,
        len: usize,
    ) -> Result<Blob, StorageError> {
        self.ensure_open()?;
        let data = self.payload(oid)?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(len).min(data.len());
        Ok(Blob::new(data[start..end].to_vec()))
    }

    async fn write_object(
        &mut self,
        oid: Oid,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), StorageError> {
        self.ensure_open()?;
        let live = self.shared.state();
        let slot = self.objects.pin(&live.objects, &oid);
        let payload = slot.value.as_mut().ok_or(StorageError::MissingObject(oid))?;
        slot.dirty = true;

        // Copies the committed payload on the first write only.
        let data = Arc::make_mut(payload);
        let start = offset as usize;
        let end = start + bytes.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    async fn insert_entry(
        &mut self,
        entry_id: Uuid,
        name: &str,
        oid: Oid,
        size: u64,
    ) -> Result<(), StorageError> {
        self.ensure_open()?;
        #[cfg(test)]
        if self.shared.reject_inserts.load(Ordering::SeqCst) {
            return Err(StorageError::Database(sqlx::Error::Protocol(
                "insert rejected".to_string(),
            )));
        }

        let live = self.shared.state();
        let name = name.to_string();
        if self.names.get(&live.names, &name).is_some() {
            return Err(StorageError::DuplicateName(name));
        }
        if self.objects.get(&live.objects, &oid).is_none() {
            return Err(StorageError::MissingObject(oid));
        }

        let row = EntryRow {
            size,
            created_at: Utc::now(),
        };
        self.entries.set(&live.entries, &entry_id, Some(row));
        self.bins.set(&live.bins, &entry_id, Some(oid));
        self.names.set(&live.names, &name, Some(entry_id));
        Ok(())
    }

    async fn update_entry_size(&mut self, entry_id: Uuid, size: u64) -> Result<(), StorageError> {
        self.ensure_open()?;
        let live = self.shared.state();
        let mut row = self
            .entries
            .get(&live.entries, &entry_id)
            .ok_or(StorageError::MissingEntry(entry_id))?;
        row.size = size;
        self.entries.set(&live.entries, &entry_id, Some(row));
        Ok(())
    }

    async fn delete_entry(&mut self, object: &StoredObject) -> Result<(), StorageError> {
        self.ensure_open()?;
        let live = self.shared.state();
        if self.objects.get(&live.objects, &object.oid).is_none() {
            return Err(StorageError::MissingObject(object.oid));
        }
        if self.entries.get(&live.entries, &object.entry_id).is_none() {
            return Err(StorageError::MissingEntry(object.entry_id));
        }

        self.objects.set(&live.objects, &object.oid, None);
        self.entries.set(&live.entries, &object.entry_id, None);
        self.bins.set(&live.bins, &object.entry_id, None);
        if self.names.get(&live.names, &object.name) == Some(object.entry_id) {
            self.names.set(&live.names, &object.name, None);
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        self.ensure_open()?;
        let published = self.publish();
        self.conn.take();
        if let Err(e) = &published {
            warn!("In-memory commit rejected: {}", e);
        }
        published
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.conn.take();
        Ok(())
    }
}
