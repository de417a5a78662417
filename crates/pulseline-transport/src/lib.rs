//! Transport collaborator for pulseline sessions.
//!
//! Dials and accepts duplex byte streams over:
//! - TCP (`tcp://host:port` or bare `host:port`)
//! - Unix domain sockets (`unix:///path` or a bare path, unix only)
//!
//! The session layer never performs raw byte I/O itself beyond framing the
//! [`NetStream`] returned here.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::{connect, Listener};
pub use stream::NetStream;
