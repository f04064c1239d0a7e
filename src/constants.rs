// src/constants.rs

/// Size of one large-object frame moved between the store and a data socket.
pub const FRAME_SIZE: usize = 5 * 1024 * 1024;

/// Tick count stored for a liveness entry while its session runs a command.
pub const LIVENESS_DISABLED: i64 = -87;

/// Longest control line accepted, terminator included.
pub const MAX_COMMAND_LINE: usize = 4096;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/rouilleblobd.conf";
pub const DEFAULT_LISTEN_PORT: u16 = 45632;
pub const DEFAULT_DATA_START_PORT: u16 = 22323;
pub const DEFAULT_DATA_PORTS_RANGE: u32 = 20000;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 20;
pub const DEFAULT_MAX_CONNECTIONS: usize = 32;
pub const DEFAULT_UPLOAD_BUFFER_SIZE: usize = 64 * 1024;
pub const DEFAULT_DB_POOL_SIZE: usize = 10;
pub const DEFAULT_TICK_MILLIS: u64 = 1000;
pub const DEFAULT_SESSION_TTL_TICKS: i64 = 300;

pub const SERVER_NAME: &str = "rouilleblobd";
