use std::sync::Arc;

use pulseline_transport::{Endpoint, Listener};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::hooks::Application;
use crate::registry::SessionRegistry;
use crate::session::SessionBuilder;

/// Accepts connections and runs a heartbeat-supervised session for each.
///
/// Every session is tracked in the listener's [`SessionRegistry`].
pub struct SessionListener {
    listener: Listener,
    builder: SessionBuilder,
    registry: Arc<SessionRegistry>,
}

impl SessionListener {
    /// Bind to `endpoint` with the default session configuration.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        let listener = Listener::bind(endpoint).await?;
        let registry = Arc::new(SessionRegistry::new());
        let builder = SessionBuilder::default().with_hooks(registry.clone());
        Ok(Self {
            listener,
            builder,
            registry,
        })
    }

    /// Override the session configuration. Validated when a session spawns.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        let application = self.builder.application();
        self.builder = SessionBuilder::new(config)
            .with_hooks(self.registry.clone())
            .with_application(application);
        self
    }

    /// Override the application collaborator shared by all sessions.
    pub fn with_application(mut self, application: Arc<dyn Application>) -> Self {
        self.builder = self.builder.with_application(application);
        self
    }

    /// Open sessions.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The endpoint actually bound.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        Ok(self.listener.local_endpoint()?)
    }

    /// Accept connections until `shutdown` is cancelled, then close every open session.
    pub async fn serve(&self, shutdown: CancellationToken) -> Result<()> {
        self.builder.config().validate()?;

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            let stream = match accepted {
                Ok(stream) => stream,
                Err(err) => {
                    self.registry.close_all();
                    return Err(err.into());
                }
            };

            let peer = stream.peer_label().to_string();
            debug!(%peer, transport = stream.transport_name(), "accepted connection");
            if let Err(err) = self.builder.spawn(stream, peer.clone()) {
                warn!(%peer, error = %err, "failed to start session");
            }
        }

        let closing = self.registry.close_all();
        info!(sessions = closing, "listener shut down");
        Ok(())
    }
}
