#![forbid(unsafe_code)]

mod connection;
pub mod handler;

pub use connection::Connection;
pub use handler::{handle_connection, handle_request};
