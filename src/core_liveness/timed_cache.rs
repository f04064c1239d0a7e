use crate::constants::LIVENESS_DISABLED;
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

type EvictCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Tick-driven expiry of session handles.
///
/// Every entry holds a number of remaining ticks. Each `on_timer` call
/// decrements the live entries and evicts those that run out, reporting them to
/// the callback given at construction. Entries parked with `disable` are left
/// alone by the timer until they are re-added.
pub struct TimedCache {
    entries: RwLock<HashMap<String, AtomicI64>>,
    on_evict: EvictCallback,
}

impl TimedCache {
    pub fn new(on_evict: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            on_evict: Box::new(on_evict),
        }
    }

    /// Inserts `id` with `ttl` ticks unless it is already present.
    ///
    /// The presence check and the insert take the lock separately, so two
    /// concurrent adds of the same id may both reach the write path; the first
    /// one wins.
    pub async fn add(&self, id: &str, ttl: i64) {
        if self.entries.read().await.contains_key(id) {
            return;
        }
        self.entries
            .write()
            .await
            .entry(id.to_string())
            .or_insert_with(|| AtomicI64::new(ttl));
    }

    /// Parks `id` so the timer never expires it.
    pub async fn disable(&self, id: &str) {
        if let Some(ticks) = self.entries.read().await.get(id) {
            ticks.store(LIVENESS_DISABLED, Ordering::SeqCst);
        }
    }

    /// Drops `id` without notifying anyone.
    pub async fn remove(&self, id: &str) {
        self.entries.write().await.remove(id);
    }

    /// Drops `id` and reports it to the eviction callback, tracked or not.
    pub async fn erase(&self, id: &str) {
        self.entries.write().await.remove(id);
        (self.on_evict)(id);
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.entries.read().await.contains_key(id)
    }

    pub async fn ticks(&self, id: &str) -> Option<i64> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|ticks| ticks.load(Ordering::SeqCst))
    }

    /// One timer tick. Returns the number of evicted entries.
    pub async fn on_timer(&self) -> usize {
        let mut expired = Vec::new();
        self.entries.write().await.retain(|id, ticks| {
            if ticks.load(Ordering::SeqCst) == LIVENESS_DISABLED {
                return true;
            }
            if ticks.fetch_sub(1, Ordering::SeqCst) - 1 <= 0 {
                expired.push(id.clone());
                return false;
            }
            true
        });

        for id in &expired {
            debug!("Liveness expired for {}", id);
            (self.on_evict)(id);
        }
        expired.len()
    }

    /// Spawns the periodic ticking task. It stops once the cache is dropped.
    pub fn start(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let evicted = cache.on_timer().await;
                trace!("Liveness tick, {} evicted", evicted);
            }
        })
    }
}
