//! Async frame reader.

use crate::error::ClientError;
use cqlmux_protocol::{Decoder, Frame, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Pulls whole frames off an async byte stream.
pub struct FrameReader<R> {
    inner: R,
    decoder: Decoder,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, read_buffer_size: usize) -> Self {
        Self {
            inner,
            decoder: Decoder::with_capacity(read_buffer_size),
            buf: vec![0u8; read_buffer_size],
        }
    }

    /// Returns the next complete frame.
    ///
    /// `Ok(None)` means the peer closed the stream on a frame boundary. EOF
    /// in the middle of a frame is a `Truncated` protocol error.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, ClientError> {
        loop {
            if let Some(frame) = self.decoder.decode_frame()? {
                return Ok(Some(frame));
            }

            let n = self.inner.read(&mut self.buf).await?;
            if n == 0 {
                let available = self.decoder.buffered();
                if available == 0 {
                    return Ok(None);
                }
                let needed = available + self.decoder.missing()?;
                return Err(ProtocolError::Truncated {
                    context: "frame",
                    needed,
                    available,
                }
                .into());
            }

            self.decoder.extend(&self.buf[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use cqlmux_protocol::Opcode;
    use tokio_test::io::Builder;

    fn encoded(stream: i16, opcode: Opcode, body: &'static [u8]) -> Vec<u8> {
        Frame::response(4, stream, opcode, Bytes::from_static(body))
            .encode()
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_frames_split_across_reads() {
        let first = encoded(0, Opcode::Ready, b"");
        let second = encoded(3, Opcode::Result, &[0, 0, 0, 1]);

        let mock = Builder::new()
            .read(&first[..4])
            .read(&first[4..])
            .read(&second[..10])
            .read(&second[10..])
            .build();
        let mut reader = FrameReader::new(mock, 1024);

        let frame = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Ready);
        assert_eq!(frame.stream, 0);

        let frame = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Result);
        assert_eq!(frame.stream, 3);
        assert_eq!(&frame.body[..], &[0, 0, 0, 1]);

        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_two_frames_in_one_read() {
        let mut bytes = encoded(1, Opcode::Result, &[0, 0, 0, 1]);
        bytes.extend(encoded(2, Opcode::Result, &[0, 0, 0, 1]));

        let mock = Builder::new().read(&bytes).build();
        let mut reader = FrameReader::new(mock, 1024);

        assert_eq!(reader.next_frame().await.unwrap().unwrap().stream, 1);
        assert_eq!(reader.next_frame().await.unwrap().unwrap().stream, 2);
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_mid_body_is_truncated() {
        let bytes = encoded(1, Opcode::Result, &[0, 0, 0, 2, 0, 0, 0, 0]);
        let mock = Builder::new().read(&bytes[..12]).build();
        let mut reader = FrameReader::new(mock, 1024);

        match reader.next_frame().await {
            Err(ClientError::Protocol(ProtocolError::Truncated {
                needed, available, ..
            })) => {
                assert_eq!(needed, 17);
                assert_eq!(available, 12);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_eof_mid_header_is_truncated() {
        let mock = Builder::new().read(&[0x84, 0x00, 0x00]).build();
        let mut reader = FrameReader::new(mock, 1024);

        assert!(matches!(
            reader.next_frame().await,
            Err(ClientError::Protocol(ProtocolError::Truncated { .. }))
        ));
    }

    #[tokio::test]
    async fn test_negative_length_rejected() {
        let header = [0x84, 0x00, 0x00, 0x01, 0x08, 0xFF, 0xFF, 0xFF, 0xFE];
        let mock = Builder::new().read(&header).build();
        let mut reader = FrameReader::new(mock, 1024);

        match reader.next_frame().await {
            Err(ClientError::Protocol(err)) => assert!(err.is_framing()),
            other => panic!("expected framing error, got {:?}", other),
        }
    }
}
