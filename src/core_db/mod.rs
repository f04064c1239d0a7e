pub mod pool;

pub use pool::{DbConnection, DbPool};
