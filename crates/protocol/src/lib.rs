#![forbid(unsafe_code)]

mod codec;
mod parse;
mod request;
mod value;

pub use parse::Parse;
pub use request::{Expiration, ExpiryMode, Request};
pub use value::Value;
