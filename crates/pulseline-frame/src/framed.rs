//! `tokio_util::codec` adapter for async byte streams.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Frames an async byte stream with the pulseline wire format.
///
/// Use with `tokio_util::codec::{Framed, FramedRead, FramedWrite}`.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_payload_size: usize,
}

impl FrameCodec {
    /// Create a codec that rejects payloads above `max_payload_size` in both directions.
    pub fn new(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    /// Configured payload cap.
    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let size = frame.payload().len();
        if size > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.max_payload_size,
            });
        }
        encode_frame(&frame, dst)
    }
}
