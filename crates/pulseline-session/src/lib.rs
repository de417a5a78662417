//! Heartbeat-supervised duplex sessions.
//!
//! A session owns one framed connection and runs two loops over it:
//!
//! - the **reader** consumes frames under a sliding read-liveness deadline,
//!   answers heartbeat probes and hands application data to an
//!   [`Application`];
//! - the **writer** is the only task that writes. It multiplexes
//!   application messages, heartbeat replies and periodic probes, each
//!   write bounded by its own deadline.
//!
//! Any failure in either loop, or a [`SessionHandle::close`], moves the
//! session `Open → Closing → Closed` exactly once.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pulseline_session::{connect, DiscardApplication};
//! use pulseline_transport::Endpoint;
//!
//! # async fn demo() -> pulseline_session::Result<()> {
//! let endpoint: Endpoint = "127.0.0.1:7400".parse()?;
//! let session = connect(&endpoint, Arc::new(DiscardApplication)).await?;
//! session.send("hello").await?;
//! session.close();
//! let reason = session.closed().await;
//! println!("{reason}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connector;
pub mod error;
pub mod hooks;
pub mod listener;
mod reader;
pub mod registry;
pub mod session;
mod writer;

pub use config::SessionConfig;
pub use connector::{connect, connect_with_config};
pub use error::{RegistryError, Result, SessionError, TerminationReason};
pub use hooks::{Application, ChannelApplication, DiscardApplication, NoHooks, SessionHooks};
pub use listener::SessionListener;
pub use registry::SessionRegistry;
pub use session::{
    SessionBuilder, SessionHandle, SessionId, SessionState, SessionStats, StatsSnapshot,
};
