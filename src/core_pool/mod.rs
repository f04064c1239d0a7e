// Bounded blocking pools shared by the data-port allocator and the database pool
pub mod error;
pub mod pool;

pub use error::PoolError;
pub use pool::{Pool, Pooled};
