//! Client error types.

use cqlmux_protocol::{AccessError, ProtocolError, ServerError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("server error: {0}")]
    Server(#[from] ServerError),

    #[error("column access error: {0}")]
    Access(#[from] AccessError),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out")]
    Timeout,

    #[error("all {0} stream ids are in flight")]
    StreamsExhausted(usize),
}

impl ClientError {
    /// Returns whether the connection that produced this error is unusable.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::Io(_) | ClientError::ConnectionClosed => true,
            ClientError::Protocol(err) => err.is_framing(),
            _ => false,
        }
    }

    /// Returns the server error, if this is one.
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            ClientError::Server(err) => Some(err),
            _ => None,
        }
    }
}
