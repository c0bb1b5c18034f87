//! HTTP protocol implementation.
//!
//! This module implements HTTP/1.1 directly on a byte stream, with support for
//! keep-alive connections.
//!
//! # Architecture
//!
//! - **`headers`**: Case-insensitive header container with line-by-line parsing
//! - **`parser`**: Incremental request parser fed from a growing byte buffer
//! - **`request`**: HTTP request representation and query string decoding
//! - **`response`**: Status codes, reason phrases and the built-in error pages
//! - **`writer`**: Ordered response writer with chunked encoding and trailers
//! - **`stream`**: Streams any async reader as a chunked response
//! - **`connection`**: The per-connection session state machine
//!
//! # Connection State Machine
//!
//! Each client connection goes through a state machine:
//!
//! ```text
//!        ┌──────────────────┐
//!        │ AwaitingRequest  │ ← Read and parse until one request is complete
//!        └──────┬───────────┘
//!               │ Request parsed      (EOF / idle timeout / parse error → Closed)
//!               ▼
//!        ┌──────────────────┐
//!        │   Dispatching    │ ← Route, run middleware and handler
//!        └──────┬───────────┘
//!               │ Response flushed
//!               ▼
//!        ┌──────────────────────┐
//!        │ DecidingContinuation │
//!        └──────┬───────────────┘
//!               ├─ Keep-Alive → AwaitingRequest (same connection)
//!               └─ Connection: close → Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tcphttp::http::connection::{ConnectionSession, SessionConfig};
//! use tcphttp::routing::Routes;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let routes = Arc::new(Routes::default());
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let session = ConnectionSession::from_tcp(socket, routes.clone(), SessionConfig::default());
//!         tokio::spawn(session.run());
//!     }
//! }
//! ```

pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod stream;
pub mod writer;
