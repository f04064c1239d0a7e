use crate::core_pool::error::PoolError;
use log::trace;
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

struct Shared<T> {
    items: Mutex<VecDeque<T>>,
    /// One permit per item sitting in `items`.
    available: Semaphore,
    capacity: usize,
}

impl<T> Shared<T> {
    fn items(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn give_back(&self, item: T) {
        self.items().push_back(item);
        self.available.add_permits(1);
    }
}

/// A bounded multi-producer/multi-consumer pool.
///
/// Checkout waits until an item is free; there is no "pool exhausted" failure,
/// callers simply queue behind each other. Items go back to the pool when the
/// [`Pooled`] guard is dropped, whatever the exit path.
pub struct Pool<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Builds a pool that owns every item of `items`.
    pub fn new(items: Vec<T>) -> Result<Self, PoolError> {
        if items.is_empty() {
            return Err(PoolError::Empty);
        }
        let capacity = items.len();
        Ok(Self {
            shared: Arc::new(Shared {
                items: Mutex::new(items.into()),
                available: Semaphore::new(capacity),
                capacity,
            }),
        })
    }

    /// Waits for a free item and leases it.
    pub async fn get(&self) -> Result<Pooled<T>, PoolError> {
        let permit = self
            .shared
            .available
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;
        permit.forget();
        self.take_leased()
    }

    fn take_leased(&self) -> Result<Pooled<T>, PoolError> {
        let item = self.shared.items().pop_front().ok_or(PoolError::Closed)?;
        trace!(
            "Pool item leased, {} of {} left",
            self.available(),
            self.shared.capacity
        );
        Ok(Pooled {
            item: Some(item),
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn available(&self) -> usize {
        self.shared.available.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

/// Lease on a pooled item, returned to its pool on drop.
pub struct Pooled<T> {
    item: Option<T>,
    shared: Arc<Shared<T>>,
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.item.as_ref().unwrap()
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.item.as_mut().unwrap()
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.item).finish()
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.shared.give_back(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_pool_is_rejected() {
        assert!(matches!(Pool::<u8>::new(Vec::new()), Err(PoolError::Empty)));
    }

    #[tokio::test]
    async fn test_items_come_back_on_drop() {
        let pool = Pool::new(vec![1u32, 2, 3]).unwrap();
        assert_eq!(pool.capacity(), 3);

        {
            let a = pool.get().await.unwrap();
            let b = pool.get().await.unwrap();
            assert_eq!(*a + *b, 3);
            assert_eq!(pool.available(), 1);
        }

        assert_eq!(pool.available(), 3);
    }

    #[tokio::test]
    async fn test_items_come_back_on_error_path() {
        async fn failing(pool: &Pool<u32>) -> Result<(), String> {
            let _lease = pool.get().await.map_err(|e| e.to_string())?;
            Err("boom".to_string())
        }

        let pool = Pool::new(vec![7u32]).unwrap();
        assert!(failing(&pool).await.is_err());
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_get_waits_until_an_item_is_returned() {
        let pool = Pool::new(vec![String::from("only")]).unwrap();
        let lease = pool.get().await.unwrap();
        assert_eq!(pool.available(), 0);

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.get().await.map(|item| item.clone()) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(lease);
        let got = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(got, "only");
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_lease_debug_shows_the_item() {
        let pool = Pool::new(vec![8021u16]).unwrap();
        let lease = pool.get().await.unwrap();
        assert_eq!(format!("{:?}", lease), "Pooled(Some(8021))");
    }

    #[tokio::test]
    async fn test_mutation_through_lease_persists() {
        let pool = Pool::new(vec![Vec::<u8>::new()]).unwrap();
        pool.get().await.unwrap().push(42);
        assert_eq!(*pool.get().await.unwrap(), vec![42]);
    }
}
