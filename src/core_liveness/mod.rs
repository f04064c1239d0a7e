pub mod registry;
pub mod timed_cache;

pub use registry::ConnectionRegistry;
pub use timed_cache::TimedCache;
