use crate::core_pool::{Pool, PoolError, Pooled};
use log::{error, info};
use std::fmt::Display;
use std::future::Future;

/// A checked-out database connection. Goes back to the pool when dropped.
pub type DbConnection<C> = Pooled<C>;

/// Fixed-size pool of live database connections.
///
/// Every connection is opened up front; failing to open any of them fails the
/// whole pool, which keeps the server from starting half-connected.
pub struct DbPool<C> {
    connections: Pool<C>,
}

impl<C> Clone for DbPool<C> {
    fn clone(&self) -> Self {
        Self {
            connections: self.connections.clone(),
        }
    }
}

impl<C: Send + 'static> DbPool<C> {
    pub async fn connect<F, Fut, E>(size: usize, mut open: F) -> Result<Self, PoolError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<C, E>>,
        E: Display,
    {
        if size == 0 {
            return Err(PoolError::Empty);
        }

        let mut connections = Vec::with_capacity(size);
        for slot in 0..size {
            match open(slot).await {
                Ok(connection) => connections.push(connection),
                Err(e) => {
                    error!("Failed to open database connection {}: {}", slot, e);
                    return Err(PoolError::Populate {
                        slot,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!("Database pool ready with {} connections", size);
        Ok(Self {
            connections: Pool::new(connections)?,
        })
    }

    /// Waits for a free connection.
    pub async fn get(&self) -> Result<DbConnection<C>, PoolError> {
        self.connections.get().await
    }

    pub fn available(&self) -> usize {
        self.connections.available()
    }

    pub fn capacity(&self) -> usize {
        self.connections.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_all_connections_are_opened_eagerly() {
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opened);
        let pool = DbPool::connect(4, move |slot| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(slot)
            }
        })
        .await
        .unwrap();

        assert_eq!(opened.load(Ordering::SeqCst), 4);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.available(), 4);
    }

    #[tokio::test]
    async fn test_one_failed_connection_fails_the_pool() {
        let result = DbPool::connect(3, |slot| async move {
            if slot == 2 {
                Err("connection refused")
            } else {
                Ok(slot)
            }
        })
        .await;

        match result {
            Err(PoolError::Populate { slot, reason }) => {
                assert_eq!(slot, 2);
                assert_eq!(reason, "connection refused");
            }
            _ => panic!("expected populate error"),
        }
    }

    #[tokio::test]
    async fn test_checkout_is_conserved_across_failures() {
        let pool = DbPool::connect(2, |slot| async move { Ok::<_, String>(slot) })
            .await
            .unwrap();

        let outcome: Result<(), String> = async {
            let _conn = pool.get().await.map_err(|e| e.to_string())?;
            Err("query failed".to_string())
        }
        .await;

        assert!(outcome.is_err());
        assert_eq!(pool.available(), 2);
    }
}
