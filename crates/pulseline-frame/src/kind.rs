//! Frame kinds.
//!
//! Kind 0 carries application data; kinds 1 and 2 are the heartbeat
//! control frames. All other values are rejected as malformed.

use std::fmt;

use crate::error::FrameError;

/// Discriminant carried in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FrameKind {
    /// Opaque application payload.
    Data = 0,
    /// Heartbeat probe; the peer must answer with a reply.
    Probe = 1,
    /// Heartbeat reply echoing a probe payload.
    Reply = 2,
}

impl FrameKind {
    /// Wire value of this kind.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Returns true for heartbeat kinds.
    pub fn is_control(self) -> bool {
        !matches!(self, FrameKind::Data)
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            FrameKind::Data => "DATA",
            FrameKind::Probe => "PROBE",
            FrameKind::Reply => "REPLY",
        }
    }
}

impl TryFrom<u16> for FrameKind {
    type Error = FrameError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(FrameKind::Data),
            1 => Ok(FrameKind::Probe),
            2 => Ok(FrameKind::Reply),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
