use std::fmt;
use std::io;

use pulseline_session::{SessionError, TerminationReason};
use pulseline_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint { .. } | TransportError::PathTooLong { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Io(source) => io_error(context, source),
        SessionError::ReadDeadline(_) | SessionError::WriteDeadline(_) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        SessionError::OversizedFrame { .. } | SessionError::MalformedFrame(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SessionError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SessionError::PeerClosed | SessionError::Closed | SessionError::QueueFull => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

/// Exit code for a session that ended on its own.
pub fn termination_code(reason: &TerminationReason) -> i32 {
    match reason {
        TerminationReason::LocalClose => SUCCESS,
        TerminationReason::PeerClosed => FAILURE,
        TerminationReason::ReadDeadline | TerminationReason::WriteDeadline => TIMEOUT,
        TerminationReason::OversizedFrame { .. } | TerminationReason::MalformedFrame(_) => {
            DATA_INVALID
        }
        TerminationReason::Transport(_) => TRANSPORT_ERROR,
        TerminationReason::Internal(_) => INTERNAL,
    }
}
