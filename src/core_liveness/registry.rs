use log::info;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Live control connections, keyed by connection id.
///
/// Each session waits on its own `Notify`; evicting the id wakes the session so
/// it can say goodbye and close.
#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: Mutex<HashMap<String, Arc<Notify>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<Notify>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: &str) -> Arc<Notify> {
        let shutdown = Arc::new(Notify::new());
        self.sessions()
            .insert(id.to_string(), Arc::clone(&shutdown));
        shutdown
    }

    pub fn unregister(&self, id: &str) {
        self.sessions().remove(id);
    }

    /// Eviction callback of the liveness cache.
    pub fn evict(&self, id: &str) {
        if let Some(shutdown) = self.sessions().remove(id) {
            info!("{} evicted by liveness timer", id);
            shutdown.notify_one();
        }
    }

    pub fn active(&self) -> usize {
        self.sessions().len()
    }
}
