//! Binary frame format for the native protocol.
//!
//! Frame layout (9 bytes header + body):
//!
//! ```text
//! +---------+-------+-----------+--------+-------------+
//! | version | flags | stream id | opcode | body length |
//! | 1 byte  | 1 byte|  2 bytes  | 1 byte |   4 bytes   |
//! +---------+-------+-----------+--------+-------------+
//! | body                                               |
//! | body length bytes                                  |
//! +----------------------------------------------------+
//! ```
//!
//! All integers are big-endian. The stream id and body length are signed.

use crate::error::ProtocolError;
use crate::MAX_BODY_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// Size of the fixed frame header in bytes (1+1+2+1+4 = 9).
pub const FRAME_HEADER_SIZE: usize = 9;

/// Direction bit set in the version byte of server responses.
pub const RESPONSE_DIRECTION: u8 = 0x80;

/// Frame flags bitfield. Carried as-is; this client never interprets them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Body is compressed.
    pub const COMPRESSION: u8 = 0x01;
    /// Tracing requested / tracing id present.
    pub const TRACING: u8 = 0x02;
    /// Custom payload present.
    pub const CUSTOM_PAYLOAD: u8 = 0x04;
    /// Server warnings present.
    pub const WARNING: u8 = 0x08;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_compressed(&self) -> bool {
        self.0 & Self::COMPRESSION != 0
    }

    pub fn has_tracing(&self) -> bool {
        self.0 & Self::TRACING != 0
    }

    pub fn has_custom_payload(&self) -> bool {
        self.0 & Self::CUSTOM_PAYLOAD != 0
    }

    pub fn has_warning(&self) -> bool {
        self.0 & Self::WARNING != 0
    }
}

/// Frame opcodes.
///
/// Decoding a header never fails on the opcode byte: values outside the
/// table become `Unknown` and are rejected by whoever interprets the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Error,
    Startup,
    Ready,
    Authenticate,
    Options,
    Supported,
    Query,
    Result,
    Prepare,
    Execute,
    Register,
    Event,
    Batch,
    AuthChallenge,
    AuthResponse,
    AuthSuccess,
    Unknown(u8),
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Opcode::Error,
            0x01 => Opcode::Startup,
            0x02 => Opcode::Ready,
            0x03 => Opcode::Authenticate,
            0x05 => Opcode::Options,
            0x06 => Opcode::Supported,
            0x07 => Opcode::Query,
            0x08 => Opcode::Result,
            0x09 => Opcode::Prepare,
            0x0A => Opcode::Execute,
            0x0B => Opcode::Register,
            0x0C => Opcode::Event,
            0x0D => Opcode::Batch,
            0x0E => Opcode::AuthChallenge,
            0x0F => Opcode::AuthResponse,
            0x10 => Opcode::AuthSuccess,
            other => Opcode::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Opcode::Error => 0x00,
            Opcode::Startup => 0x01,
            Opcode::Ready => 0x02,
            Opcode::Authenticate => 0x03,
            Opcode::Options => 0x05,
            Opcode::Supported => 0x06,
            Opcode::Query => 0x07,
            Opcode::Result => 0x08,
            Opcode::Prepare => 0x09,
            Opcode::Execute => 0x0A,
            Opcode::Register => 0x0B,
            Opcode::Event => 0x0C,
            Opcode::Batch => 0x0D,
            Opcode::AuthChallenge => 0x0E,
            Opcode::AuthResponse => 0x0F,
            Opcode::AuthSuccess => 0x10,
            Opcode::Unknown(byte) => byte,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Error => write!(f, "ERROR"),
            Opcode::Startup => write!(f, "STARTUP"),
            Opcode::Ready => write!(f, "READY"),
            Opcode::Authenticate => write!(f, "AUTHENTICATE"),
            Opcode::Options => write!(f, "OPTIONS"),
            Opcode::Supported => write!(f, "SUPPORTED"),
            Opcode::Query => write!(f, "QUERY"),
            Opcode::Result => write!(f, "RESULT"),
            Opcode::Prepare => write!(f, "PREPARE"),
            Opcode::Execute => write!(f, "EXECUTE"),
            Opcode::Register => write!(f, "REGISTER"),
            Opcode::Event => write!(f, "EVENT"),
            Opcode::Batch => write!(f, "BATCH"),
            Opcode::AuthChallenge => write!(f, "AUTH_CHALLENGE"),
            Opcode::AuthResponse => write!(f, "AUTH_RESPONSE"),
            Opcode::AuthSuccess => write!(f, "AUTH_SUCCESS"),
            Opcode::Unknown(byte) => write!(f, "UNKNOWN({:#04x})", byte),
        }
    }
}

/// A single protocol message: header fields plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw version byte, including the response direction bit.
    pub version: u8,
    /// Frame flags.
    pub flags: FrameFlags,
    /// Stream id. Zero and negative ids are reserved for control and events.
    pub stream: i16,
    /// Frame opcode.
    pub opcode: Opcode,
    /// Frame body.
    pub body: Bytes,
}

impl Frame {
    /// Creates a request frame with no flags set.
    pub fn request(version: u8, stream: i16, opcode: Opcode, body: Bytes) -> Self {
        Self {
            version: version & !RESPONSE_DIRECTION,
            flags: FrameFlags::new(),
            stream,
            opcode,
            body,
        }
    }

    /// Creates a response frame (direction bit set) with no flags set.
    pub fn response(version: u8, stream: i16, opcode: Opcode, body: Bytes) -> Self {
        Self {
            version: version | RESPONSE_DIRECTION,
            flags: FrameFlags::new(),
            stream,
            opcode,
            body,
        }
    }

    /// Protocol version without the direction bit.
    pub fn protocol_version(&self) -> u8 {
        self.version & !RESPONSE_DIRECTION
    }

    pub fn is_response(&self) -> bool {
        self.version & RESPONSE_DIRECTION != 0
    }

    /// Returns whether this frame travels on the control/event streams.
    pub fn is_control(&self) -> bool {
        self.stream <= 0
    }

    /// Total encoded size (header + body).
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.body.len()
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let body_len = self.body.len();
        if body_len > MAX_BODY_SIZE as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: u32::try_from(body_len).unwrap_or(u32::MAX),
                max: MAX_BODY_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_header(&mut buf);
        buf.put_slice(&self.body);
        Ok(buf)
    }

    fn encode_header(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_u8(self.flags.bits());
        buf.put_i16(self.stream);
        buf.put_u8(self.opcode.to_byte());
        buf.put_i32(self.body.len() as i32);
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on a malformed header.
    /// Nothing is consumed from `buf` unless a whole frame is available.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        let Some(body_len) = Self::peek_body_len(buf)? else {
            return Ok(None);
        };

        let total_len = FRAME_HEADER_SIZE + body_len;
        if buf.len() < total_len {
            return Ok(None);
        }

        let version = buf.get_u8();
        let flags = FrameFlags::from_bits(buf.get_u8());
        let stream = buf.get_i16();
        let opcode = Opcode::from_byte(buf.get_u8());
        buf.advance(4);
        let body = buf.split_to(body_len).freeze();

        Ok(Some(Self {
            version,
            flags,
            stream,
            opcode,
            body,
        }))
    }

    /// Reads the declared body length from a buffered header without
    /// consuming anything.
    pub fn peek_body_len(buf: &[u8]) -> Result<Option<usize>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let declared = i32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]);
        if declared < 0 {
            return Err(ProtocolError::InvalidLength(declared));
        }
        if declared as u32 > MAX_BODY_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: declared as u32,
                max: MAX_BODY_SIZE,
            });
        }

        Ok(Some(declared as usize))
    }
}
