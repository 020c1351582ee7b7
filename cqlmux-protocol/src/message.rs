//! Request bodies and response interpretation.

use crate::error::{ErrorCode, ProtocolError, ServerError};
use crate::frame::{Frame, Opcode};
use crate::result::QueryResult;
use crate::wire;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::str::FromStr;

/// Stream id reserved for connection-level exchanges (STARTUP / READY).
pub const CONTROL_STREAM: i16 = 0;

/// Consistency levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Consistency {
    Any,
    #[default]
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
    LocalOne,
}

impl Consistency {
    pub fn code(self) -> u16 {
        match self {
            Consistency::Any => 0x0000,
            Consistency::One => 0x0001,
            Consistency::Two => 0x0002,
            Consistency::Three => 0x0003,
            Consistency::Quorum => 0x0004,
            Consistency::All => 0x0005,
            Consistency::LocalQuorum => 0x0006,
            Consistency::EachQuorum => 0x0007,
            Consistency::Serial => 0x0008,
            Consistency::LocalSerial => 0x0009,
            Consistency::LocalOne => 0x000A,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        let level = match code {
            0x0000 => Consistency::Any,
            0x0001 => Consistency::One,
            0x0002 => Consistency::Two,
            0x0003 => Consistency::Three,
            0x0004 => Consistency::Quorum,
            0x0005 => Consistency::All,
            0x0006 => Consistency::LocalQuorum,
            0x0007 => Consistency::EachQuorum,
            0x0008 => Consistency::Serial,
            0x0009 => Consistency::LocalSerial,
            0x000A => Consistency::LocalOne,
            _ => return None,
        };
        Some(level)
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Consistency::Any => "ANY",
            Consistency::One => "ONE",
            Consistency::Two => "TWO",
            Consistency::Three => "THREE",
            Consistency::Quorum => "QUORUM",
            Consistency::All => "ALL",
            Consistency::LocalQuorum => "LOCAL_QUORUM",
            Consistency::EachQuorum => "EACH_QUORUM",
            Consistency::Serial => "SERIAL",
            Consistency::LocalSerial => "LOCAL_SERIAL",
            Consistency::LocalOne => "LOCAL_ONE",
        };
        f.write_str(name)
    }
}

impl FromStr for Consistency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        let level = match normalized.as_str() {
            "ANY" => Consistency::Any,
            "ONE" => Consistency::One,
            "TWO" => Consistency::Two,
            "THREE" => Consistency::Three,
            "QUORUM" => Consistency::Quorum,
            "ALL" => Consistency::All,
            "LOCAL_QUORUM" => Consistency::LocalQuorum,
            "EACH_QUORUM" => Consistency::EachQuorum,
            "SERIAL" => Consistency::Serial,
            "LOCAL_SERIAL" => Consistency::LocalSerial,
            "LOCAL_ONE" => Consistency::LocalOne,
            _ => return Err(format!("unknown consistency level: {}", s)),
        };
        Ok(level)
    }
}

/// STARTUP body: a `[string map]` of connection options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupBody {
    options: Vec<(String, String)>,
}

impl StartupBody {
    pub const CQL_VERSION: &'static str = "CQL_VERSION";

    pub fn new(cql_version: impl Into<String>) -> Self {
        Self {
            options: vec![(Self::CQL_VERSION.to_string(), cql_version.into())],
        }
    }

    /// Adds or replaces an option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.options.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.options.push((key, value)),
        }
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        wire::write_string_map(
            &mut buf,
            self.options.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );
        buf.freeze()
    }

    pub fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        let mut options: Vec<_> = wire::read_string_map(&mut body)?.into_iter().collect();
        options.sort();
        Ok(Self { options })
    }

    /// Builds the STARTUP frame on the control stream.
    pub fn to_frame(&self, version: u8) -> Frame {
        Frame::request(version, CONTROL_STREAM, Opcode::Startup, self.encode())
    }
}

/// QUERY body: `[long string]` query, `[short]` consistency, flags byte.
///
/// Flags are always zero here: no bound values, paging or serial
/// consistency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBody {
    pub query: String,
    pub consistency: Consistency,
    pub flags: u8,
}

impl QueryBody {
    pub fn new(query: impl Into<String>, consistency: Consistency) -> Self {
        Self {
            query: query.into(),
            consistency,
            flags: 0,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 + self.query.len() + 3);
        wire::write_long_string(&mut buf, &self.query);
        buf.put_u16(self.consistency.code());
        buf.put_u8(self.flags);
        buf.freeze()
    }

    pub fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        let query = wire::read_long_string(&mut body)?;
        let code = wire::read_short(&mut body)?;
        let consistency = Consistency::from_code(code)
            .ok_or_else(|| ProtocolError::invalid_cell("consistency", format!("{:#06x}", code)))?;
        let flags = wire::read_byte(&mut body)?;
        Ok(Self {
            query,
            consistency,
            flags,
        })
    }

    pub fn to_frame(&self, version: u8, stream: i16) -> Frame {
        Frame::request(version, stream, Opcode::Query, self.encode())
    }
}

impl ServerError {
    /// Decodes an ERROR body: `[int]` code then `[string]` message.
    /// Code-specific trailing fields are ignored.
    pub fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        let code = wire::read_int(&mut body)?;
        let message = wire::read_string(&mut body)?;
        Ok(Self {
            code: ErrorCode::from_code(code),
            message,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_i32(self.code.code());
        wire::write_string(&mut buf, &self.message);
        buf.freeze()
    }
}

/// A response frame interpreted by opcode.
#[derive(Debug, Clone)]
pub enum Response {
    Ready,
    Error(ServerError),
    Result(QueryResult),
}

impl Response {
    /// Interprets a response frame. Opcodes this client never expects
    /// fail with [`ProtocolError::UnexpectedOpcode`].
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        match frame.opcode {
            Opcode::Ready => Ok(Response::Ready),
            Opcode::Error => Ok(Response::Error(ServerError::decode(frame.body.clone())?)),
            Opcode::Result => Ok(Response::Result(QueryResult::decode(frame.body.clone())?)),
            other => Err(ProtocolError::UnexpectedOpcode(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency_codes() {
        for code in 0..=0x000A {
            let level = Consistency::from_code(code).unwrap();
            assert_eq!(level.code(), code);
            assert_eq!(level.to_string().parse::<Consistency>().unwrap(), level);
        }
        assert!(Consistency::from_code(0x000B).is_none());
        assert_eq!(Consistency::default(), Consistency::One);
    }

    #[test]
    fn test_consistency_parse_lenient() {
        assert_eq!(
            "local-quorum".parse::<Consistency>().unwrap(),
            Consistency::LocalQuorum
        );
        assert_eq!(" quorum ".parse::<Consistency>().unwrap(), Consistency::Quorum);
        assert!("most".parse::<Consistency>().is_err());
    }

    #[test]
    fn test_startup_body() {
        let startup = StartupBody::new("3.0.0").with_option("DRIVER_NAME", "cqlmux");
        let frame = startup.to_frame(4);
        assert_eq!(frame.stream, CONTROL_STREAM);
        assert_eq!(frame.opcode, Opcode::Startup);
        assert!(!frame.is_response());

        let decoded = StartupBody::decode(frame.body).unwrap();
        assert_eq!(decoded.option(StartupBody::CQL_VERSION), Some("3.0.0"));
        assert_eq!(decoded.option("DRIVER_NAME"), Some("cqlmux"));
    }

    #[test]
    fn test_startup_option_replaced() {
        let startup = StartupBody::new("3.0.0").with_option(StartupBody::CQL_VERSION, "3.4.5");
        assert_eq!(startup.option(StartupBody::CQL_VERSION), Some("3.4.5"));
        assert_eq!(StartupBody::decode(startup.encode()).unwrap().options.len(), 1);
    }

    #[test]
    fn test_query_body_layout() {
        let body = QueryBody::new("SELECT now();", Consistency::Quorum).encode();
        let mut expected = vec![0, 0, 0, 13];
        expected.extend_from_slice(b"SELECT now();");
        expected.extend_from_slice(&[0x00, 0x04, 0x00]);
        assert_eq!(&body[..], &expected[..]);

        let decoded = QueryBody::decode(body).unwrap();
        assert_eq!(decoded.query, "SELECT now();");
        assert_eq!(decoded.consistency, Consistency::Quorum);
        assert_eq!(decoded.flags, 0);
    }

    #[test]
    fn test_response_error() {
        let err = ServerError {
            code: ErrorCode::Invalid,
            message: "syntax error".to_string(),
        };
        let frame = Frame::response(4, 3, Opcode::Error, err.encode());
        match Response::from_frame(&frame).unwrap() {
            Response::Error(decoded) => {
                assert_eq!(decoded.code.code(), 0x2200);
                assert_eq!(decoded.message, "syntax error");
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_response_error_with_trailing_fields() {
        let mut body = BytesMut::new();
        body.put_i32(0x1000);
        wire::write_string(&mut body, "not enough replicas");
        body.put_u16(0x0004);
        body.put_i32(3);
        body.put_i32(1);
        let frame = Frame::response(4, 1, Opcode::Error, body.freeze());
        match Response::from_frame(&frame).unwrap() {
            Response::Error(decoded) => assert_eq!(decoded.code, ErrorCode::Unavailable),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_response_ready_and_result() {
        let ready = Frame::response(4, 0, Opcode::Ready, Bytes::new());
        assert!(matches!(Response::from_frame(&ready).unwrap(), Response::Ready));

        let void = Frame::response(4, 1, Opcode::Result, Bytes::from_static(&[0, 0, 0, 1]));
        assert!(matches!(
            Response::from_frame(&void).unwrap(),
            Response::Result(QueryResult::Void)
        ));
    }

    #[test]
    fn test_unexpected_opcode() {
        for opcode in [Opcode::Authenticate, Opcode::Event, Opcode::Unknown(0x7F)] {
            let frame = Frame::response(4, 1, opcode, Bytes::new());
            assert!(matches!(
                Response::from_frame(&frame),
                Err(ProtocolError::UnexpectedOpcode(op)) if op == opcode
            ));
        }
    }
}
