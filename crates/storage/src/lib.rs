#![forbid(unsafe_code)]

mod db;
mod entry;
mod keyspace;
mod persist;
pub mod snapshot;

pub use db::Db;
pub use entry::StoredEntry;
pub use keyspace::{ExpireOutcome, Keyspace, ListEnd};
pub use persist::{FilePersistor, MemoryPersistor, Persistor};
