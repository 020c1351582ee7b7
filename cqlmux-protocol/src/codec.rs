//! Buffered frame decoder.

use crate::error::ProtocolError;
use crate::frame::{Frame, FRAME_HEADER_SIZE};
use bytes::BytesMut;

/// Accumulates raw socket bytes and yields complete frames.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_capacity(8192)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        let frame = Frame::decode(&mut self.buffer)?;
        if frame.is_none() {
            self.reserve_for_pending()?;
        }
        Ok(frame)
    }

    /// Number of bytes still missing for the frame at the head of the
    /// buffer, or zero when the buffer is empty.
    pub fn missing(&self) -> Result<usize, ProtocolError> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        match Frame::peek_body_len(&self.buffer)? {
            Some(body_len) => Ok((FRAME_HEADER_SIZE + body_len).saturating_sub(self.buffer.len())),
            None => Ok(FRAME_HEADER_SIZE - self.buffer.len()),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    // Large bodies would otherwise regrow the buffer on every socket read.
    fn reserve_for_pending(&mut self) -> Result<(), ProtocolError> {
        let missing = self.missing()?;
        if missing > 0 {
            self.buffer.reserve(missing);
        }
        Ok(())
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Opcode;
    use bytes::Bytes;

    #[test]
    fn test_partial_frame_decoding() {
        let frame = Frame::response(4, 5, Opcode::Result, Bytes::from_static(b"\x00\x00\x00\x01"));
        let encoded = frame.encode().unwrap();

        let mut decoder = Decoder::new();

        decoder.extend(&encoded[..6]);
        assert!(decoder.decode_frame().unwrap().is_none());
        assert_eq!(decoder.missing().unwrap(), 3);

        decoder.extend(&encoded[6..10]);
        assert!(decoder.decode_frame().unwrap().is_none());
        assert_eq!(decoder.missing().unwrap(), 3);

        decoder.extend(&encoded[10..]);
        assert_eq!(decoder.decode_frame().unwrap().unwrap(), frame);
        assert_eq!(decoder.buffered(), 0);
        assert_eq!(decoder.missing().unwrap(), 0);
    }

    #[test]
    fn test_byte_at_a_time() {
        let frame = Frame::response(4, 2, Opcode::Result, Bytes::from(vec![1u8; 100]));
        let encoded = frame.encode().unwrap();

        let mut decoder = Decoder::new();
        let mut decoded = None;
        for byte in encoded.iter() {
            decoder.extend(&[*byte]);
            if let Some(f) = decoder.decode_frame().unwrap() {
                decoded = Some(f);
            }
        }
        assert_eq!(decoded.unwrap(), frame);
    }

    #[test]
    fn test_malformed_header_surfaces() {
        let mut decoder = Decoder::new();
        decoder.extend(&[0x84, 0x00, 0x00, 0x01, 0x08, 0x80, 0x00, 0x00, 0x00]);
        assert!(matches!(
            decoder.decode_frame(),
            Err(ProtocolError::InvalidLength(_))
        ));
    }

    #[test]
    fn test_decoder_buffered_and_clear() {
        let mut decoder = Decoder::default();
        assert_eq!(decoder.buffered(), 0);

        decoder.extend(b"some data");
        assert_eq!(decoder.buffered(), 9);

        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
    }
}
