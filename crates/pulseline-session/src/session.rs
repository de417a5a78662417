//! Session lifecycle: spawning the loops, the handle, teardown.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use bytes::Bytes;
use futures_util::{Sink, Stream};
use pulseline_frame::{Frame, FrameCodec, FrameError, FrameKind};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError, TerminationReason};
use crate::hooks::{Application, DiscardApplication, NoHooks, SessionHooks};
use crate::{reader, writer};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// `Open → Closing → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Both loops running.
    Open,
    /// A close was requested or a loop failed; loops are unwinding.
    Closing,
    /// Both loops have returned. Terminal.
    Closed,
}

/// Diagnostic counters, updated by the loops.
#[derive(Debug, Default)]
pub struct SessionStats {
    frames_received: AtomicU64,
    data_received: AtomicU64,
    data_sent: AtomicU64,
    probes_received: AtomicU64,
    probes_sent: AtomicU64,
    replies_received: AtomicU64,
    replies_sent: AtomicU64,
    last_reply: Mutex<Option<Bytes>>,
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_received: u64,
    pub data_received: u64,
    pub data_sent: u64,
    pub probes_received: u64,
    pub probes_sent: u64,
    pub replies_received: u64,
    pub replies_sent: u64,
}

impl SessionStats {
    pub(crate) fn record_received(&self, frame: &Frame) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        let counter = match frame {
            Frame::Data(_) => &self.data_received,
            Frame::Probe(_) => &self.probes_received,
            Frame::Reply(payload) => {
                *self.last_reply.lock().unwrap_or_else(|p| p.into_inner()) = Some(payload.clone());
                &self.replies_received
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self, kind: FrameKind) {
        let counter = match kind {
            FrameKind::Data => &self.data_sent,
            FrameKind::Probe => &self.probes_sent,
            FrameKind::Reply => &self.replies_sent,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Payload of the most recent heartbeat reply received.
    pub fn last_reply(&self) -> Option<Bytes> {
        self.last_reply
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            data_received: self.data_received.load(Ordering::Relaxed),
            data_sent: self.data_sent.load(Ordering::Relaxed),
            probes_received: self.probes_received.load(Ordering::Relaxed),
            probes_sent: self.probes_sent.load(Ordering::Relaxed),
            replies_received: self.replies_received.load(Ordering::Relaxed),
            replies_sent: self.replies_sent.load(Ordering::Relaxed),
        }
    }
}

/// State shared by a session's handle and loops.
pub(crate) struct Shared {
    pub(crate) id: SessionId,
    pub(crate) peer: String,
    pub(crate) cancel: CancellationToken,
    pub(crate) stats: SessionStats,
    state: watch::Sender<SessionState>,
    reason: OnceLock<TerminationReason>,
}

impl Shared {
    fn new(peer: String) -> Self {
        let (state, _) = watch::channel(SessionState::Open);
        Self {
            id: SessionId::next(),
            peer,
            cancel: CancellationToken::new(),
            stats: SessionStats::default(),
            state,
            reason: OnceLock::new(),
        }
    }

    /// Enter `Closing` and cancel both loops. The first caller's reason sticks.
    pub(crate) fn begin_closing(&self, reason: TerminationReason) {
        let _ = self.reason.set(reason);
        self.state.send_if_modified(|state| {
            if *state == SessionState::Open {
                *state = SessionState::Closing;
                true
            } else {
                false
            }
        });
        self.cancel.cancel();
    }

    /// Record a fatal loop error.
    pub(crate) fn fail(&self, loop_name: &'static str, err: SessionError) {
        if self.cancel.is_cancelled() {
            debug!(session = %self.id, loop_name, error = %err, "error during teardown");
        } else {
            warn!(session = %self.id, peer = %self.peer, loop_name, error = %err, "session failed");
        }
        self.begin_closing(err.termination_reason());
    }

    fn finish(&self) {
        self.state.send_replace(SessionState::Closed);
    }
}

/// Cloneable handle to a running session.
///
/// Producer side of the OutboundQueue and the control surface for teardown.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
    outbound: mpsc::Sender<Bytes>,
}

impl SessionHandle {
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// Remote identity, for diagnostics.
    pub fn peer(&self) -> &str {
        &self.shared.peer
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// True while both loops are running and no close was requested.
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Diagnostic counters.
    pub fn stats(&self) -> &SessionStats {
        &self.shared.stats
    }

    /// Why the session ended, once it has started closing.
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.shared.reason.get().cloned()
    }

    /// Queue an application message, waiting for queue capacity.
    pub async fn send(&self, payload: impl Into<Bytes>) -> Result<()> {
        if !self.is_open() {
            return Err(SessionError::Closed);
        }
        tokio::select! {
            _ = self.shared.cancel.cancelled() => Err(SessionError::Closed),
            sent = self.outbound.send(payload.into()) => sent.map_err(|_| SessionError::Closed),
        }
    }

    /// Queue an application message without waiting.
    pub fn try_send(&self, payload: impl Into<Bytes>) -> Result<()> {
        if !self.is_open() {
            return Err(SessionError::Closed);
        }
        self.outbound
            .try_send(payload.into())
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => SessionError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => SessionError::Closed,
            })
    }

    /// Close the session. Idempotent; safe from any task.
    pub fn close(&self) {
        self.shared.begin_closing(TerminationReason::LocalClose);
    }

    /// Wait until both loops have returned and the termination hook has run.
    pub async fn closed(&self) -> TerminationReason {
        let mut state = self.shared.state.subscribe();
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
        self.termination_reason()
            .unwrap_or(TerminationReason::LocalClose)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.shared.id)
            .field("peer", &self.shared.peer)
            .field("state", &self.state())
            .finish()
    }
}

/// Spawns sessions with a shared configuration and collaborators.
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct SessionBuilder {
    config: SessionConfig,
    application: Arc<dyn Application>,
    hooks: Arc<dyn SessionHooks>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionBuilder {
    /// Builder with `config`, discarding application data and ignoring lifecycle events.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            application: Arc::new(DiscardApplication),
            hooks: Arc::new(NoHooks),
        }
    }

    /// Override the application collaborator.
    pub fn with_application(mut self, application: Arc<dyn Application>) -> Self {
        self.application = application;
        self
    }

    /// Override the lifecycle hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn SessionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Application collaborator handed to every spawned session.
    pub fn application(&self) -> Arc<dyn Application> {
        Arc::clone(&self.application)
    }

    /// Start a session over a duplex byte stream.
    pub fn spawn<T>(&self, io: T, peer: impl Into<String>) -> Result<SessionHandle>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(io);
        let frames = FramedRead::new(read_half, FrameCodec::new(self.config.max_frame_size));
        let sink = FramedWrite::new(write_half, FrameCodec::default());
        self.spawn_framed(frames, sink, peer)
    }

    /// Start a session over an already-framed transport.
    pub fn spawn_framed<St, Si>(
        &self,
        frames: St,
        sink: Si,
        peer: impl Into<String>,
    ) -> Result<SessionHandle>
    where
        St: Stream<Item = std::result::Result<Frame, FrameError>> + Unpin + Send + 'static,
        Si: Sink<Frame, Error = FrameError> + Unpin + Send + 'static,
    {
        self.config.validate()?;

        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_capacity);
        let (reply_tx, reply_rx) = mpsc::channel(self.config.reply_capacity);
        let shared = Arc::new(Shared::new(peer.into()));
        let handle = SessionHandle {
            shared: Arc::clone(&shared),
            outbound: outbound_tx,
        };

        self.hooks.on_session_established(&handle);
        info!(session = %shared.id, peer = %shared.peer, "session established");

        let reader_task = tokio::spawn(reader::run(
            frames,
            handle.clone(),
            Arc::clone(&self.application),
            reply_tx,
            self.config.read_liveness_window,
        ));
        let writer_task = tokio::spawn(writer::run(
            sink,
            Arc::clone(&shared),
            outbound_rx,
            reply_rx,
            self.config.probe_period,
            self.config.write_deadline,
        ));
        tokio::spawn(supervise(
            handle.clone(),
            reader_task,
            writer_task,
            Arc::clone(&self.hooks),
        ));

        Ok(handle)
    }
}

async fn supervise(
    handle: SessionHandle,
    mut reader_task: JoinHandle<()>,
    mut writer_task: JoinHandle<()>,
    hooks: Arc<dyn SessionHooks>,
) {
    let shared = &handle.shared;

    // A loop that exits normally has already cancelled its sibling; a panicked
    // one has not, so cancel on its behalf before waiting for the other.
    let reader_done = tokio::select! {
        joined = &mut reader_task => {
            if let Err(err) = joined {
                record_panic(shared, err);
            }
            true
        }
        joined = &mut writer_task => {
            if let Err(err) = joined {
                record_panic(shared, err);
            }
            false
        }
    };
    let rest = if reader_done { writer_task } else { reader_task };
    if let Err(err) = rest.await {
        record_panic(shared, err);
    }

    let reason = handle
        .termination_reason()
        .unwrap_or(TerminationReason::LocalClose);
    info!(
        session = %shared.id,
        peer = %shared.peer,
        reason = %reason,
        "session terminated"
    );
    hooks.on_session_terminated(&handle, &reason);
    shared.finish();
}

fn record_panic(shared: &Shared, err: JoinError) {
    error!(session = %shared.id, error = %err, "session task failed");
    shared.begin_closing(TerminationReason::Internal(err.to_string()));
}
