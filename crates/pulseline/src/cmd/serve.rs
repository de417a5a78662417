use std::sync::Arc;

use bytes::Bytes;
use pulseline_session::{Application, SessionError, SessionHandle, SessionListener};
use tokio_util::sync::CancellationToken;

use crate::cmd::{parse_endpoint, ServeArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_shutdown, OutputFormat};

/// Sends every application message back on the session it arrived on.
struct EchoApplication;

impl Application for EchoApplication {
    fn on_application_data(&self, session: &SessionHandle, payload: Bytes) {
        let size = payload.len();
        match session.try_send(payload) {
            Ok(()) => tracing::debug!(session = %session.id(), size, "echoing message"),
            Err(SessionError::QueueFull) => {
                tracing::warn!(session = %session.id(), peer = %session.peer(), size, "outbound queue full; dropping echo")
            }
            Err(err) => tracing::debug!(session = %session.id(), error = %err, "echo skipped"),
        }
    }
}

pub async fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let config = args.liveness.to_config()?;
    let drain_budget = config.write_deadline;

    let listener = SessionListener::bind(&endpoint)
        .await
        .map_err(|err| session_error("bind failed", err))?
        .with_config(config)
        .with_application(Arc::new(EchoApplication));
    let bound = listener
        .local_endpoint()
        .map_err(|err| session_error("bind failed", err))?;

    let shutdown = CancellationToken::new();
    spawn_interrupt_handler(shutdown.clone());

    listener
        .serve(shutdown)
        .await
        .map_err(|err| session_error("accept failed", err))?;

    // Sessions were asked to close; give them one write deadline to finish.
    let closing = listener.registry().handles();
    for session in &closing {
        if tokio::time::timeout(drain_budget, session.closed())
            .await
            .is_err()
        {
            tracing::warn!(session = %session.id(), "session did not close in time");
        }
    }

    print_shutdown(&bound, closing.len(), format);

    Ok(SUCCESS)
}

fn spawn_interrupt_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(err) => tracing::warn!(error = %err, "signal handler setup failed"),
        }
    });
}
