use std::fmt;
use std::time::Duration;

use pulseline_frame::FrameError;
use pulseline_transport::TransportError;

use crate::session::SessionId;

/// Errors that can occur in session operations.
///
/// Every error observed by a running session's loops is fatal to that session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error while establishing a connection.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O failure while sending or receiving a frame.
    #[error("connection I/O error: {0}")]
    Io(std::io::Error),

    /// No frame arrived within the read-liveness window.
    #[error("no frame received within {0:?}")]
    ReadDeadline(Duration),

    /// A single write did not complete within the write deadline.
    #[error("write did not complete within {0:?}")]
    WriteDeadline(Duration),

    /// A frame exceeded the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    OversizedFrame { size: usize, max: usize },

    /// Bytes on the wire could not be classified as a frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The peer closed the connection.
    #[error("peer closed the connection")]
    PeerClosed,

    /// The session is closing or closed and accepts no more outbound data.
    #[error("session closed")]
    Closed,

    /// The outbound queue is full.
    #[error("outbound queue full")]
    QueueFull,

    /// Session configuration is inconsistent.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
}

impl SessionError {
    /// The termination reason this error produces when it ends a session.
    pub fn termination_reason(&self) -> TerminationReason {
        match self {
            SessionError::ReadDeadline(_) => TerminationReason::ReadDeadline,
            SessionError::WriteDeadline(_) => TerminationReason::WriteDeadline,
            SessionError::OversizedFrame { size, max } => TerminationReason::OversizedFrame {
                size: *size,
                max: *max,
            },
            SessionError::MalformedFrame(detail) => {
                TerminationReason::MalformedFrame(detail.clone())
            }
            SessionError::PeerClosed => TerminationReason::PeerClosed,
            SessionError::Closed => TerminationReason::LocalClose,
            other => TerminationReason::Transport(other.to_string()),
        }
    }
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::PayloadTooLarge { size, max } => SessionError::OversizedFrame { size, max },
            FrameError::ConnectionClosed => SessionError::PeerClosed,
            FrameError::Io(io) => SessionError::Io(io),
            malformed => SessionError::MalformedFrame(malformed.to_string()),
        }
    }
}

/// Why a session ended. Recorded once, by whichever party closed first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// `SessionHandle::close` was called.
    LocalClose,
    /// The peer closed the connection.
    PeerClosed,
    /// The read-liveness deadline elapsed.
    ReadDeadline,
    /// A write exceeded the write deadline.
    WriteDeadline,
    /// An inbound frame exceeded the size cap.
    OversizedFrame { size: usize, max: usize },
    /// An inbound frame could not be classified.
    MalformedFrame(String),
    /// I/O failure on the connection.
    Transport(String),
    /// A session task panicked.
    Internal(String),
}

impl TerminationReason {
    /// True when the local side asked for the close.
    pub fn is_local(&self) -> bool {
        matches!(self, TerminationReason::LocalClose)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::LocalClose => f.write_str("closed locally"),
            TerminationReason::PeerClosed => f.write_str("peer closed the connection"),
            TerminationReason::ReadDeadline => f.write_str("read-liveness deadline exceeded"),
            TerminationReason::WriteDeadline => f.write_str("write deadline exceeded"),
            TerminationReason::OversizedFrame { size, max } => {
                write!(f, "oversized frame ({size} bytes, max {max})")
            }
            TerminationReason::MalformedFrame(detail) => write!(f, "malformed frame: {detail}"),
            TerminationReason::Transport(detail) => write!(f, "transport error: {detail}"),
            TerminationReason::Internal(detail) => write!(f, "internal error: {detail}"),
        }
    }
}

/// Errors reported by the session registry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Removal of a session that is not registered.
    #[error("session {0} is not registered")]
    UnknownSession(SessionId),

    /// A session with the same id is already registered.
    #[error("session {0} is already registered")]
    DuplicateSession(SessionId),
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pulseline_frame::FrameKind;

    #[test]
    fn frame_errors_map_to_session_taxonomy() {
        let oversized: SessionError = FrameError::PayloadTooLarge { size: 9, max: 4 }.into();
        assert!(matches!(
            oversized,
            SessionError::OversizedFrame { size: 9, max: 4 }
        ));

        let malformed: SessionError = FrameError::UnknownKind(42).into();
        assert!(matches!(malformed, SessionError::MalformedFrame(_)));

        let control: SessionError = FrameError::ControlPayloadTooLarge {
            kind: FrameKind::Probe,
            size: 200,
            max: 125,
        }
        .into();
        assert!(matches!(control, SessionError::MalformedFrame(_)));

        let closed: SessionError = FrameError::ConnectionClosed.into();
        assert!(matches!(closed, SessionError::PeerClosed));

        let io: SessionError =
            FrameError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).into();
        assert!(matches!(io, SessionError::Io(_)));
    }

    #[test]
    fn termination_reasons() {
        assert_eq!(
            SessionError::ReadDeadline(Duration::from_secs(1)).termination_reason(),
            TerminationReason::ReadDeadline
        );
        assert_eq!(
            SessionError::WriteDeadline(Duration::from_secs(1)).termination_reason(),
            TerminationReason::WriteDeadline
        );
        assert!(matches!(
            SessionError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
                .termination_reason(),
            TerminationReason::Transport(_)
        ));
        assert!(SessionError::Closed.termination_reason().is_local());
    }
}
