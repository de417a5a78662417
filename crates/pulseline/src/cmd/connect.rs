use std::sync::Arc;
use std::time::Instant;

use pulseline_session::{connect_with_config, ChannelApplication, SessionError, SessionHandle};
use tokio::time::MissedTickBehavior;

use crate::cmd::{parse_duration, parse_endpoint, ConnectArgs};
use crate::exit::{session_error, termination_code, CliResult};
use crate::output::{print_message, print_summary, unix_timestamp, OutputFormat};

pub async fn run(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let config = args.liveness.to_config()?;
    let interval = parse_duration(&args.interval)?;
    let duration = parse_duration(&args.duration)?;

    let (application, mut received) = ChannelApplication::new();
    let session = connect_with_config(&endpoint, config, Arc::new(application), None)
        .await
        .map_err(|err| session_error("connect failed", err))?;
    tracing::info!(session = %session.id(), peer = %session.peer(), "connected");

    let started = Instant::now();
    let stop_at = tokio::time::sleep(duration);
    tokio::pin!(stop_at);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut interrupts_armed = true;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let closed = session.closed();
    tokio::pin!(closed);

    let reason = loop {
        tokio::select! {
            reason = &mut closed => break reason,
            _ = &mut stop_at => {
                tracing::info!(?duration, "run duration elapsed, closing");
                session.close();
                break session.closed().await;
            }
            signal = &mut interrupt, if interrupts_armed => match signal {
                Ok(()) => {
                    tracing::info!("interrupt received, closing");
                    session.close();
                    break session.closed().await;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "signal handler setup failed");
                    interrupts_armed = false;
                }
            },
            _ = ticker.tick() => send_timestamp(&session),
            Some(payload) = received.recv() => print_message(&session, &payload, format),
        }
    };

    while let Ok(payload) = received.try_recv() {
        print_message(&session, &payload, format);
    }
    print_summary(&session, &reason, started.elapsed(), format);

    Ok(termination_code(&reason))
}

fn send_timestamp(session: &SessionHandle) {
    match session.try_send(unix_timestamp()) {
        Ok(()) => {}
        Err(SessionError::QueueFull) => {
            tracing::warn!(session = %session.id(), "outbound queue full; skipping timestamp")
        }
        // Closing: the closed branch reports why.
        Err(err) => tracing::debug!(session = %session.id(), error = %err, "timestamp not sent"),
    }
}
