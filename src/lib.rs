//! tcphttp - HTTP/1.1 over raw TCP
//!
//! Incremental request parsing, ordered response writing and keep-alive
//! connection handling, with a small router and middleware layer on top.

pub mod config;
pub mod http;
pub mod routing;
pub mod server;
