use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::kind::FrameKind;

/// Frame header: magic (2) + length (4) + kind (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "PL" (0x50 0x4C).
pub const MAGIC: [u8; 2] = [0x50, 0x4C];

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Largest payload a probe or reply may carry.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// A classified unit of transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Application payload, delivered to the application collaborator.
    Data(Bytes),
    /// Heartbeat probe with an opaque payload.
    Probe(Bytes),
    /// Heartbeat reply; echoes the probe payload byte-for-byte.
    Reply(Bytes),
}

impl Frame {
    /// Create a data frame.
    pub fn data(payload: impl Into<Bytes>) -> Self {
        Frame::Data(payload.into())
    }

    /// Build the reply that answers a probe carrying `payload`.
    pub fn reply_to(payload: Bytes) -> Self {
        Frame::Reply(payload)
    }

    /// The kind carried in the header.
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Data(_) => FrameKind::Data,
            Frame::Probe(_) => FrameKind::Probe,
            Frame::Reply(_) => FrameKind::Reply,
        }
    }

    /// Borrow the payload.
    pub fn payload(&self) -> &Bytes {
        match self {
            Frame::Data(payload) | Frame::Probe(payload) | Frame::Reply(payload) => payload,
        }
    }

    /// Consume the frame and return its payload.
    pub fn into_payload(self) -> Bytes {
        match self {
            Frame::Data(payload) | Frame::Probe(payload) | Frame::Reply(payload) => payload,
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload().len()
    }

    fn from_parts(kind: FrameKind, payload: Bytes) -> Self {
        match kind {
            FrameKind::Data => Frame::Data(payload),
            FrameKind::Probe => Frame::Probe(payload),
            FrameKind::Reply => Frame::Reply(payload),
        }
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬──────────┬─────────────────┐
/// │ Magic (2B)   │ Length    │ Kind     │ Payload         │
/// │ 0x50 0x4C    │ (4B LE)   │ (2B LE)  │ (Length bytes)  │
/// │ "PL"         │           │          │                 │
/// └──────────────┴───────────┴──────────┴─────────────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let kind = frame.kind();
    let payload = frame.payload();
    check_control_payload(kind, payload.len())?;
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(payload.len() as u32);
    dst.put_u16_le(kind.code());
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// Size limits are enforced from the header alone, so an oversized frame is
/// rejected before any of its payload is buffered.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let payload_len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;
    let kind = FrameKind::try_from(u16::from_le_bytes([src[6], src[7]]))?;

    check_control_payload(kind, payload_len)?;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame::from_parts(kind, payload)))
}

fn check_control_payload(kind: FrameKind, size: usize) -> Result<()> {
    if kind.is_control() && size > MAX_CONTROL_PAYLOAD {
        return Err(FrameError::ControlPayloadTooLarge {
            kind,
            size,
            max: MAX_CONTROL_PAYLOAD,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_data_frame() {
        let mut buf = BytesMut::new();
        let frame = Frame::data(&b"hello, pulseline!"[..]);

        encode_frame(&frame, &mut buf).unwrap();
        assert_eq!(buf.len(), frame.wire_size());

        let decoded = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_probe_and_reply_keep_their_kind() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::Probe(Bytes::from_static(b"p1")), &mut buf).unwrap();
        encode_frame(&Frame::reply_to(Bytes::from_static(b"p1")), &mut buf).unwrap();

        let probe = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        let reply = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(probe.kind(), FrameKind::Probe);
        assert_eq!(reply.kind(), FrameKind::Reply);
        assert_eq!(probe.payload(), reply.payload());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x50, 0x4C, 0x00][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::data(&b"hello"[..]), &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 2, "partial frame must stay buffered");
    }

    #[test]
    fn test_decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidMagic)));
    }

    #[test]
    fn test_decode_unknown_kind() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(0);
        buf.put_u16_le(9);

        let err = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap_err();
        assert!(matches!(err, FrameError::UnknownKind(9)));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_decode_payload_too_large_from_header_only() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(1024);
        buf.put_u16_le(FrameKind::Data.code());

        let err = decode_frame(&mut buf, 512).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge {
                size: 1024,
                max: 512
            }
        ));
        assert!(!err.is_malformed());
    }

    #[test]
    fn test_control_payload_limit() {
        let mut buf = BytesMut::new();
        let probe = Frame::Probe(Bytes::from(vec![0u8; MAX_CONTROL_PAYLOAD + 1]));
        let err = encode_frame(&probe, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::ControlPayloadTooLarge { .. }));

        buf.clear();
        buf.put_slice(&MAGIC);
        buf.put_u32_le((MAX_CONTROL_PAYLOAD + 1) as u32);
        buf.put_u16_le(FrameKind::Reply.code());
        let err = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_empty_probe_payload() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::Probe(Bytes::new()), &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let frame = decode_frame(&mut buf, 0).unwrap().unwrap();
        assert_eq!(frame, Frame::Probe(Bytes::new()));
    }
}
