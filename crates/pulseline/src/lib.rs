//! Heartbeat-supervised duplex connections.
//!
//! pulseline keeps long-lived connections honest: each session probes its
//! peer on a timer, answers the peer's probes, and tears the connection down
//! when nothing has been heard within the read-liveness window or a write
//! stalls past its deadline.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and Unix socket endpoints, listeners and dialing
//! - [`frame`]: length-prefixed framing of data, probe and reply frames
//! - [`session`]: reader/writer loops, liveness deadlines, teardown, registry

/// Re-export transport types.
pub mod transport {
    pub use pulseline_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pulseline_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use pulseline_session::*;
}
