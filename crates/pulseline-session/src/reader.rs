//! Reader loop: sole owner of the read half.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use pulseline_frame::{Frame, FrameError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{Result, SessionError};
use crate::hooks::Application;
use crate::session::SessionHandle;

pub(crate) async fn run<S>(
    frames: S,
    handle: SessionHandle,
    application: Arc<dyn Application>,
    replies: mpsc::Sender<Bytes>,
    window: Duration,
) where
    S: Stream<Item = std::result::Result<Frame, FrameError>> + Unpin,
{
    if let Err(err) = read_frames(frames, &handle, application.as_ref(), replies, window).await {
        handle.shared().fail("reader", err);
    }
}

/// Returns `Ok(())` only when the session was cancelled.
async fn read_frames<S>(
    mut frames: S,
    handle: &SessionHandle,
    application: &dyn Application,
    replies: mpsc::Sender<Bytes>,
    window: Duration,
) -> Result<()>
where
    S: Stream<Item = std::result::Result<Frame, FrameError>> + Unpin,
{
    let shared = handle.shared();
    let mut deadline = Instant::now() + window;

    loop {
        let next = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return Ok(()),
            next = tokio::time::timeout_at(deadline, frames.next()) => next,
        };

        let frame = match next {
            Err(_elapsed) => return Err(SessionError::ReadDeadline(window)),
            Ok(None) => return Err(SessionError::PeerClosed),
            Ok(Some(Err(err))) => return Err(err.into()),
            Ok(Some(Ok(frame))) => frame,
        };

        // Any frame proves the peer is responsive.
        deadline = Instant::now() + window;
        shared.stats.record_received(&frame);

        match frame {
            Frame::Probe(payload) => {
                debug!(session = %shared.id, peer = %shared.peer, "received probe");
                tokio::select! {
                    biased;
                    _ = shared.cancel.cancelled() => return Ok(()),
                    queued = replies.send(payload) => {
                        if queued.is_err() {
                            // Writer is gone, which only happens during teardown.
                            return Ok(());
                        }
                    }
                }
            }
            Frame::Reply(payload) => {
                debug!(
                    session = %shared.id,
                    peer = %shared.peer,
                    size = payload.len(),
                    "received reply"
                );
            }
            Frame::Data(payload) => {
                trace!(session = %shared.id, size = payload.len(), "delivering application data");
                application.on_application_data(handle, payload);
            }
        }
    }
}
