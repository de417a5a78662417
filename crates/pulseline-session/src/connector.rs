use std::sync::Arc;

use pulseline_transport::Endpoint;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::hooks::{Application, SessionHooks};
use crate::session::{SessionBuilder, SessionHandle};

/// Dial `endpoint` and start a session with the default configuration.
pub async fn connect(
    endpoint: &Endpoint,
    application: Arc<dyn Application>,
) -> Result<SessionHandle> {
    connect_with_config(endpoint, SessionConfig::default(), application, None).await
}

/// Dial `endpoint` with explicit configuration and optional lifecycle hooks.
pub async fn connect_with_config(
    endpoint: &Endpoint,
    config: SessionConfig,
    application: Arc<dyn Application>,
    hooks: Option<Arc<dyn SessionHooks>>,
) -> Result<SessionHandle> {
    config.validate()?;

    let stream = pulseline_transport::connect(endpoint).await?;
    let peer = stream.peer_label().to_string();

    let mut builder = SessionBuilder::new(config).with_application(application);
    if let Some(hooks) = hooks {
        builder = builder.with_hooks(hooks);
    }
    builder.spawn(stream, peer)
}
