use std::time::Duration;

use clap::{Args, Subcommand};
use pulseline_session::SessionConfig;
use pulseline_transport::Endpoint;

use crate::exit::{session_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod connect;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an echo server that supervises every connection with heartbeats.
    Serve(ServeArgs),
    /// Connect, send a timestamp periodically and print what comes back.
    Connect(ConnectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format).await,
        Command::Connect(args) => connect::run(args, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Endpoint to bind: `host:port`, `tcp://host:port`, `unix:///path` or a socket path.
    pub endpoint: String,
    #[command(flatten)]
    pub liveness: LivenessArgs,
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Endpoint to dial: `host:port`, `tcp://host:port`, `unix:///path` or a socket path.
    pub endpoint: String,
    /// Time between outgoing timestamp messages (e.g. 500ms, 2s).
    #[arg(long, default_value = "500ms")]
    pub interval: String,
    /// Close the session after this long (e.g. 30s).
    #[arg(long, default_value = "600s")]
    pub duration: String,
    #[command(flatten)]
    pub liveness: LivenessArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug)]
pub struct LivenessArgs {
    /// Close the session when nothing is received for this long.
    #[arg(long, default_value = "60s")]
    pub liveness_window: String,
    /// Heartbeat probe interval. Default: 7/10 of the liveness window.
    #[arg(long)]
    pub probe_period: Option<String>,
    /// Budget for each individual write.
    #[arg(long, default_value = "10s")]
    pub write_deadline: String,
    /// Maximum inbound message size in bytes.
    #[arg(long, default_value_t = pulseline_session::config::DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
}

impl LivenessArgs {
    pub fn to_config(&self) -> CliResult<SessionConfig> {
        let mut config = SessionConfig::with_liveness_window(parse_duration(&self.liveness_window)?);
        if let Some(period) = &self.probe_period {
            config.probe_period = parse_duration(period)?;
        }
        config.write_deadline = parse_duration(&self.write_deadline)?;
        config.max_frame_size = self.max_frame_size;
        config
            .validate()
            .map_err(|err| session_error("invalid liveness settings", err))?;
        Ok(config)
    }
}

pub fn parse_endpoint(input: &str) -> CliResult<Endpoint> {
    input
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn liveness(window: &str, probe: Option<&str>) -> LivenessArgs {
        LivenessArgs {
            liveness_window: window.to_string(),
            probe_period: probe.map(str::to_string),
            write_deadline: "10s".to_string(),
            max_frame_size: 512,
        }
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn probe_period_defaults_to_seven_tenths() {
        let config = liveness("10s", None).to_config().unwrap();
        assert_eq!(config.read_liveness_window, Duration::from_secs(10));
        assert_eq!(config.probe_period, Duration::from_secs(7));
    }

    #[test]
    fn probe_period_not_shorter_than_window_is_usage_error() {
        let err = liveness("10s", Some("10s")).to_config().unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn endpoint_parse_errors_are_usage_errors() {
        assert!(parse_endpoint("127.0.0.1:7400").is_ok());
        assert_eq!(parse_endpoint("127.0.0.1:notaport").unwrap_err().code, USAGE);
    }
}
