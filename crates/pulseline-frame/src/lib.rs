//! Length-prefixed framing for data and heartbeat traffic.
//!
//! Every frame on the wire carries:
//! - A 2-byte magic number ("PL") for stream synchronization
//! - A 4-byte little-endian payload length
//! - A 2-byte little-endian kind (data, heartbeat probe, heartbeat reply)
//!
//! Callers only ever see complete, classified [`Frame`]s.

pub mod codec;
pub mod error;
pub mod framed;
pub mod kind;

pub use codec::{
    decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MAGIC,
    MAX_CONTROL_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use framed::FrameCodec;
pub use kind::FrameKind;
