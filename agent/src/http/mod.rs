//! HTTP/1.1 over a byte-stream transport

pub mod client;
pub mod headers;
pub mod href;
pub mod transport;
