use crate::core_pool::{Pool, PoolError, Pooled};
use log::debug;

/// Lease on one data port. Dropping it hands the port back to the allocator.
pub type PortLease = Pooled<u16>;

/// Allocator for the passive-mode data ports.
///
/// Pre-filled with every port of the configured range. `acquire` waits until a
/// port is free, which always happens eventually because every data connection
/// gives its lease back when it closes.
#[derive(Clone)]
pub struct PortPool {
    ports: Pool<u16>,
}

impl PortPool {
    pub fn new(start_port: u16, range: u16) -> Result<Self, PoolError> {
        let ports: Vec<u16> = (0..range)
            .filter_map(|offset| start_port.checked_add(offset))
            .collect();
        debug!(
            "Data port pool ready with {} ports starting at {}",
            ports.len(),
            start_port
        );
        Ok(Self {
            ports: Pool::new(ports)?,
        })
    }

    pub async fn acquire(&self) -> Result<PortLease, PoolError> {
        self.ports.get().await
    }

    pub fn available(&self) -> usize {
        self.ports.available()
    }

    pub fn capacity(&self) -> usize {
        self.ports.capacity()
    }
}
