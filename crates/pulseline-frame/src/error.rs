use crate::kind::FrameKind;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x504C \"PL\")")]
    InvalidMagic,

    /// The frame header names a kind this protocol does not define.
    #[error("unknown frame kind {0}")]
    UnknownKind(u16),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A heartbeat frame carries more than the control payload limit.
    #[error("{kind} payload too large ({size} bytes, max {max})")]
    ControlPayloadTooLarge {
        kind: FrameKind,
        size: usize,
        max: usize,
    },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True when the bytes on the wire could not be classified as a frame.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidMagic
                | FrameError::UnknownKind(_)
                | FrameError::ControlPayloadTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
