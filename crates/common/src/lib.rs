#![forbid(unsafe_code)]

mod error;

pub use error::*;

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const MAX_CONNECTIONS: usize = 1024;
pub const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024; // 4 KB
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024; // 64 MB
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_DUMP_FILE: &str = "driftdb_dump.db";

/// Instante atual em milissegundos desde a época Unix.
pub fn epoch_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
