//! Protocol error types and server error codes.

use crate::frame::Opcode;
use std::fmt;
use thiserror::Error;

/// Errors raised while framing or interpreting protocol data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("truncated {context}: need {needed} bytes, have {available}")]
    Truncated {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("invalid frame body length: {0}")]
    InvalidLength(i32),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("invalid {kind} cell: {reason}")]
    InvalidCell { kind: &'static str, reason: String },

    #[error("unexpected opcode {0}")]
    UnexpectedOpcode(Opcode),

    #[error("unknown result kind: {0:#06x}")]
    UnknownResultKind(i32),

    #[error("unsupported column type code: {0:#06x}")]
    UnsupportedType(u16),

    #[error("unsupported result metadata flags: {0:#x}")]
    UnsupportedMetadata(i32),
}

impl ProtocolError {
    pub(crate) fn truncated(context: &'static str, needed: usize, available: usize) -> Self {
        ProtocolError::Truncated {
            context,
            needed,
            available,
        }
    }

    pub(crate) fn invalid_cell(kind: &'static str, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidCell {
            kind,
            reason: reason.into(),
        }
    }

    /// Returns whether this error means the byte stream itself can no longer
    /// be trusted (as opposed to a single bad response body).
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidLength(_) | ProtocolError::FrameTooLarge { .. }
        )
    }
}

/// Column lookup and typed access errors on a decoded row.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("no such column: {0}")]
    NoSuchColumn(String),

    #[error("column index {index} out of range ({len} columns)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("column {column}: expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("column decode failed: {0}")]
    Decode(#[from] ProtocolError),
}

/// Error codes carried by ERROR frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ServerError,
    ProtocolError,
    BadCredentials,
    Unavailable,
    Overloaded,
    IsBootstrapping,
    TruncateError,
    WriteTimeout,
    ReadTimeout,
    ReadFailure,
    FunctionFailure,
    WriteFailure,
    SyntaxError,
    Unauthorized,
    Invalid,
    ConfigError,
    AlreadyExists,
    Unprepared,
    Other(i32),
}

impl ErrorCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            0x0000 => ErrorCode::ServerError,
            0x000A => ErrorCode::ProtocolError,
            0x0100 => ErrorCode::BadCredentials,
            0x1000 => ErrorCode::Unavailable,
            0x1001 => ErrorCode::Overloaded,
            0x1002 => ErrorCode::IsBootstrapping,
            0x1003 => ErrorCode::TruncateError,
            0x1100 => ErrorCode::WriteTimeout,
            0x1200 => ErrorCode::ReadTimeout,
            0x1300 => ErrorCode::ReadFailure,
            0x1400 => ErrorCode::FunctionFailure,
            0x1500 => ErrorCode::WriteFailure,
            0x2000 => ErrorCode::SyntaxError,
            0x2100 => ErrorCode::Unauthorized,
            0x2200 => ErrorCode::Invalid,
            0x2300 => ErrorCode::ConfigError,
            0x2400 => ErrorCode::AlreadyExists,
            0x2500 => ErrorCode::Unprepared,
            other => ErrorCode::Other(other),
        }
    }

    /// Returns the raw wire value.
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::ServerError => 0x0000,
            ErrorCode::ProtocolError => 0x000A,
            ErrorCode::BadCredentials => 0x0100,
            ErrorCode::Unavailable => 0x1000,
            ErrorCode::Overloaded => 0x1001,
            ErrorCode::IsBootstrapping => 0x1002,
            ErrorCode::TruncateError => 0x1003,
            ErrorCode::WriteTimeout => 0x1100,
            ErrorCode::ReadTimeout => 0x1200,
            ErrorCode::ReadFailure => 0x1300,
            ErrorCode::FunctionFailure => 0x1400,
            ErrorCode::WriteFailure => 0x1500,
            ErrorCode::SyntaxError => 0x2000,
            ErrorCode::Unauthorized => 0x2100,
            ErrorCode::Invalid => 0x2200,
            ErrorCode::ConfigError => 0x2300,
            ErrorCode::AlreadyExists => 0x2400,
            ErrorCode::Unprepared => 0x2500,
            ErrorCode::Other(code) => *code,
        }
    }

    /// Returns whether a caller may reasonably retry the request.
    ///
    /// Advisory only; the client itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::Unavailable
                | ErrorCode::Overloaded
                | ErrorCode::IsBootstrapping
                | ErrorCode::WriteTimeout
                | ErrorCode::ReadTimeout
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::ServerError => write!(f, "SERVER_ERROR"),
            ErrorCode::ProtocolError => write!(f, "PROTOCOL_ERROR"),
            ErrorCode::BadCredentials => write!(f, "BAD_CREDENTIALS"),
            ErrorCode::Unavailable => write!(f, "UNAVAILABLE"),
            ErrorCode::Overloaded => write!(f, "OVERLOADED"),
            ErrorCode::IsBootstrapping => write!(f, "IS_BOOTSTRAPPING"),
            ErrorCode::TruncateError => write!(f, "TRUNCATE_ERROR"),
            ErrorCode::WriteTimeout => write!(f, "WRITE_TIMEOUT"),
            ErrorCode::ReadTimeout => write!(f, "READ_TIMEOUT"),
            ErrorCode::ReadFailure => write!(f, "READ_FAILURE"),
            ErrorCode::FunctionFailure => write!(f, "FUNCTION_FAILURE"),
            ErrorCode::WriteFailure => write!(f, "WRITE_FAILURE"),
            ErrorCode::SyntaxError => write!(f, "SYNTAX_ERROR"),
            ErrorCode::Unauthorized => write!(f, "UNAUTHORIZED"),
            ErrorCode::Invalid => write!(f, "INVALID"),
            ErrorCode::ConfigError => write!(f, "CONFIG_ERROR"),
            ErrorCode::AlreadyExists => write!(f, "ALREADY_EXISTS"),
            ErrorCode::Unprepared => write!(f, "UNPREPARED"),
            ErrorCode::Other(code) => write!(f, "ERROR_{:#06x}", code),
        }
    }
}

/// A decoded ERROR frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} ({:#06x}): {message}", .code.code())]
pub struct ServerError {
    pub code: ErrorCode,
    pub message: String,
}
