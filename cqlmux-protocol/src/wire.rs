//! Wire notation primitives.
//!
//! Readers operate on a `Bytes` cursor and never panic on short input;
//! every read checks the remaining length first and fails with
//! [`ProtocolError::Truncated`].

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fn ensure(buf: &Bytes, needed: usize, context: &'static str) -> Result<(), ProtocolError> {
    if buf.remaining() < needed {
        return Err(ProtocolError::truncated(context, needed, buf.remaining()));
    }
    Ok(())
}

pub fn read_byte(buf: &mut Bytes) -> Result<u8, ProtocolError> {
    ensure(buf, 1, "[byte]")?;
    Ok(buf.get_u8())
}

pub fn read_short(buf: &mut Bytes) -> Result<u16, ProtocolError> {
    ensure(buf, 2, "[short]")?;
    Ok(buf.get_u16())
}

pub fn read_int(buf: &mut Bytes) -> Result<i32, ProtocolError> {
    ensure(buf, 4, "[int]")?;
    Ok(buf.get_i32())
}

fn read_utf8(buf: &mut Bytes, len: usize, context: &'static str) -> Result<String, ProtocolError> {
    ensure(buf, len, context)?;
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8(context))
}

/// `[string]`: a `[short]` length followed by UTF-8 bytes.
pub fn read_string(buf: &mut Bytes) -> Result<String, ProtocolError> {
    let len = read_short(buf)? as usize;
    read_utf8(buf, len, "[string]")
}

/// `[long string]`: an `[int]` length followed by UTF-8 bytes.
pub fn read_long_string(buf: &mut Bytes) -> Result<String, ProtocolError> {
    let len = read_int(buf)?;
    if len < 0 {
        return Err(ProtocolError::InvalidLength(len));
    }
    read_utf8(buf, len as usize, "[long string]")
}

/// `[bytes]`: an `[int]` length followed by that many bytes. A negative
/// length is a null value.
pub fn read_bytes(buf: &mut Bytes) -> Result<Option<Bytes>, ProtocolError> {
    let len = read_int(buf)?;
    if len < 0 {
        return Ok(None);
    }
    let len = len as usize;
    ensure(buf, len, "[bytes]")?;
    Ok(Some(buf.split_to(len)))
}

pub fn read_string_map(buf: &mut Bytes) -> Result<HashMap<String, String>, ProtocolError> {
    let n = read_short(buf)?;
    let mut map = HashMap::with_capacity(n as usize);
    for _ in 0..n {
        let key = read_string(buf)?;
        let value = read_string(buf)?;
        map.insert(key, value);
    }
    Ok(map)
}

/// Interprets a 4- or 16-byte slice as an IP address.
pub fn ip_from_slice(raw: &[u8]) -> Result<IpAddr, ProtocolError> {
    match raw.len() {
        4 => {
            let octets: [u8; 4] = raw
                .try_into()
                .map_err(|_| ProtocolError::invalid_cell("inet", "bad IPv4 length"))?;
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = raw
                .try_into()
                .map_err(|_| ProtocolError::invalid_cell("inet", "bad IPv6 length"))?;
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        n => Err(ProtocolError::invalid_cell(
            "inet",
            format!("address must be 4 or 16 bytes, got {}", n),
        )),
    }
}

pub fn write_string(buf: &mut impl BufMut, value: &str) {
    buf.put_u16(value.len() as u16);
    buf.put_slice(value.as_bytes());
}

pub fn write_long_string(buf: &mut impl BufMut, value: &str) {
    buf.put_i32(value.len() as i32);
    buf.put_slice(value.as_bytes());
}

/// Writes `[bytes]`; `None` is encoded as length -1.
pub fn write_bytes(buf: &mut impl BufMut, value: Option<&[u8]>) {
    match value {
        Some(bytes) => {
            buf.put_i32(bytes.len() as i32);
            buf.put_slice(bytes);
        }
        None => buf.put_i32(-1),
    }
}

/// Writes a `[string map]`. Entries are emitted in the given order.
pub fn write_string_map<'a>(
    buf: &mut impl BufMut,
    entries: impl ExactSizeIterator<Item = (&'a str, &'a str)>,
) {
    buf.put_u16(entries.len() as u16);
    for (key, value) in entries {
        write_string(buf, key);
        write_string(buf, value);
    }
}
