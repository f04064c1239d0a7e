pub mod data_channel;
pub mod error;
pub mod network;
pub mod pasv;
pub mod port;
pub mod port_pool;

pub use data_channel::{DataChannel, DataMode};
pub use error::DataChannelError;
pub use port_pool::{PortLease, PortPool};
