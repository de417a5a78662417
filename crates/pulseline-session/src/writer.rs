//! Writer loop: sole owner of the write half.
//!
//! Multiplexes three sources onto the connection, one frame at a time:
//! application messages (OutboundQueue), heartbeat replies requested by the
//! reader (ReplyQueue) and the probe timer. The timer lives and dies with
//! this loop.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Sink, SinkExt};
use pulseline_frame::{Frame, FrameError, FrameKind};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::config::PROBE_PAYLOAD_LEN;
use crate::error::{Result, SessionError};
use crate::session::Shared;

/// How the writer observed cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// Between writes: the sink holds no partial frame.
    Idle,
    /// A write was abandoned part way; the sink must not be flushed.
    Interrupted,
}

pub(crate) async fn run<K>(
    mut sink: K,
    shared: Arc<Shared>,
    outbound: mpsc::Receiver<Bytes>,
    replies: mpsc::Receiver<Bytes>,
    probe_period: Duration,
    write_deadline: Duration,
) where
    K: Sink<Frame, Error = FrameError> + Unpin,
{
    let result = write_frames(
        &mut sink,
        &shared,
        outbound,
        replies,
        probe_period,
        write_deadline,
    )
    .await;

    match result {
        Ok(Teardown::Idle) => close_sink(&mut sink, &shared, write_deadline).await,
        Ok(Teardown::Interrupted) => {
            debug!(session = %shared.id, "write abandoned during teardown");
        }
        Err(err) => shared.fail("writer", err),
    }
}

/// Returns `Ok` only when the session was cancelled.
async fn write_frames<K>(
    sink: &mut K,
    shared: &Shared,
    mut outbound: mpsc::Receiver<Bytes>,
    mut replies: mpsc::Receiver<Bytes>,
    probe_period: Duration,
    write_deadline: Duration,
) -> Result<Teardown>
where
    K: Sink<Frame, Error = FrameError> + Unpin,
{
    let mut probes = tokio::time::interval_at(Instant::now() + probe_period, probe_period);
    probes.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut probe_seq: u64 = 0;
    let mut outbound_open = true;
    let mut replies_open = true;

    loop {
        // Unbiased: ready branches are polled in random order so no source starves.
        let frame = tokio::select! {
            _ = shared.cancel.cancelled() => return Ok(Teardown::Idle),
            message = outbound.recv(), if outbound_open => match message {
                Some(payload) => Frame::Data(payload),
                None => {
                    outbound_open = false;
                    continue;
                }
            },
            reply = replies.recv(), if replies_open => match reply {
                Some(payload) => Frame::Reply(payload),
                None => {
                    replies_open = false;
                    continue;
                }
            },
            _ = probes.tick() => {
                probe_seq = probe_seq.wrapping_add(1);
                debug!(session = %shared.id, peer = %shared.peer, seq = probe_seq, "sending probe");
                let payload: [u8; PROBE_PAYLOAD_LEN] = probe_seq.to_be_bytes();
                Frame::Probe(Bytes::copy_from_slice(&payload))
            }
        };

        let kind = frame.kind();
        if kind == FrameKind::Reply {
            debug!(session = %shared.id, peer = %shared.peer, "sending reply");
        }
        // Cancellation abandons an in-flight write.
        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return Ok(Teardown::Interrupted),
            written = write_frame(sink, frame, write_deadline) => written?,
        }
        shared.stats.record_sent(kind);
    }
}

/// One write, with its own fresh deadline.
async fn write_frame<K>(sink: &mut K, frame: Frame, deadline: Duration) -> Result<()>
where
    K: Sink<Frame, Error = FrameError> + Unpin,
{
    match tokio::time::timeout(deadline, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.into()),
        Err(_elapsed) => Err(SessionError::WriteDeadline(deadline)),
    }
}

/// Flush and shut down the write half so the peer sees EOF. Failures here
/// race with the peer going away and are expected.
async fn close_sink<K>(sink: &mut K, shared: &Shared, deadline: Duration)
where
    K: Sink<Frame, Error = FrameError> + Unpin,
{
    match tokio::time::timeout(deadline, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(session = %shared.id, error = %err, "ignoring close error during teardown"),
        Err(_elapsed) => debug!(session = %shared.id, "close timed out during teardown"),
    }
}
