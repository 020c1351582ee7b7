//! # cqlmux-client
//!
//! Async client for the CQL native protocol.
//!
//! This crate provides:
//! - A single-socket connection engine that multiplexes concurrent queries
//!   by stream id
//! - The stream id allocator with one-shot response mailboxes
//! - An async frame reader that never short-reads
//!
//! ```no_run
//! use cqlmux_client::{Connection, ConnectionConfig};
//! use cqlmux_protocol::Consistency;
//!
//! # async fn demo() -> Result<(), cqlmux_client::ClientError> {
//! let conn = Connection::connect(ConnectionConfig::new("127.0.0.1", 9042)).await?;
//! let rows = conn.query("SELECT now() FROM system.local;", Consistency::One).await?;
//! for row in &rows {
//!     println!("{}", row);
//! }
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod framed;
pub mod streams;

pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionState};
pub use error::ClientError;
pub use streams::{StreamAllocator, StreamSlot};
