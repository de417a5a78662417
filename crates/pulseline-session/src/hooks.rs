//! Collaborator interfaces a session calls into.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::TerminationReason;
use crate::session::SessionHandle;

/// Receives application payloads from a session's reader loop.
///
/// Called synchronously on the reader task. Implementations must not block:
/// a stalled delivery stalls frame processing for the whole session. Hand
/// work off (e.g. `SessionHandle::try_send`, a channel) instead of waiting.
pub trait Application: Send + Sync + 'static {
    /// One complete application frame arrived on `session`.
    fn on_application_data(&self, session: &SessionHandle, payload: Bytes);
}

impl<F> Application for F
where
    F: Fn(&SessionHandle, Bytes) + Send + Sync + 'static,
{
    fn on_application_data(&self, session: &SessionHandle, payload: Bytes) {
        self(session, payload)
    }
}

/// Discards application payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardApplication;

impl Application for DiscardApplication {
    fn on_application_data(&self, session: &SessionHandle, payload: Bytes) {
        trace!(session = %session.id(), size = payload.len(), "discarding application data");
    }
}

/// Forwards application payloads onto a collaborator-owned channel.
#[derive(Debug, Clone)]
pub struct ChannelApplication {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ChannelApplication {
    /// Create the adapter and the receiving end the collaborator drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Application for ChannelApplication {
    fn on_application_data(&self, session: &SessionHandle, payload: Bytes) {
        if self.tx.send(payload).is_err() {
            trace!(session = %session.id(), "application receiver dropped; discarding data");
        }
    }
}

/// Session lifecycle notifications, e.g. for a registry of open sessions.
///
/// Both hooks run on session tasks and must return promptly.
pub trait SessionHooks: Send + Sync + 'static {
    /// The session's loops are about to start.
    fn on_session_established(&self, _session: &SessionHandle) {}

    /// Both loops have returned; fired exactly once per session.
    fn on_session_terminated(&self, _session: &SessionHandle, _reason: &TerminationReason) {}
}

/// Ignores lifecycle notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl SessionHooks for NoHooks {}
