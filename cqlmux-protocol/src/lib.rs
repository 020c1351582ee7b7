//! # cqlmux-protocol
//!
//! Wire protocol implementation for the CQL native protocol (v3/v4 subset).
//!
//! This crate provides:
//! - Binary framing with the fixed 9-byte header and length-prefixed body
//! - Wire primitives (`[int]`, `[string]`, `[bytes]`, ...)
//! - The column type registry and typed value decoding
//! - Rows / result set model with lazy cell decoding
//! - Request bodies (STARTUP, QUERY) and the response interpreter
//!
//! Nothing here performs I/O; the async connection engine lives in
//! `cqlmux-client`.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod result;
pub mod types;
pub mod wire;

pub use codec::Decoder;
pub use error::{AccessError, ErrorCode, ProtocolError, ServerError};
pub use frame::{Frame, FrameFlags, Opcode, FRAME_HEADER_SIZE};
pub use message::{Consistency, QueryBody, Response, StartupBody, CONTROL_STREAM};
pub use result::{ColumnRef, ColumnSpec, Columns, QueryResult, ResultSet, Row};
pub use types::{CollectionKind, ColumnType, FromValue, Value};

/// Default protocol version sent in request frames.
pub const PROTOCOL_VERSION: u8 = 4;

/// Oldest protocol version with 16-bit stream ids.
pub const MIN_PROTOCOL_VERSION: u8 = 3;

/// CQL version announced in STARTUP.
pub const DEFAULT_CQL_VERSION: &str = "3.0.0";

/// Default native transport port.
pub const DEFAULT_PORT: u16 = 9042;

/// Maximum frame body size (256 MiB).
pub const MAX_BODY_SIZE: u32 = 256 * 1024 * 1024;
