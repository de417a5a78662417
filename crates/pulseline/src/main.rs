mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::exit::{CliError, INTERNAL};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pulseline", version, about = "Heartbeat-supervised connections CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))
        .and_then(|runtime| runtime.block_on(cmd::run(cli.command, format)));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "pulseline",
            "serve",
            "127.0.0.1:7400",
            "--liveness-window",
            "30s",
            "--max-frame-size",
            "1024",
        ])
        .expect("serve args should parse");

        let Command::Serve(args) = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(args.endpoint, "127.0.0.1:7400");
        assert_eq!(args.liveness.liveness_window, "30s");
        assert_eq!(args.liveness.max_frame_size, 1024);
    }

    #[test]
    fn parses_connect_subcommand_with_global_format() {
        let cli = Cli::try_parse_from([
            "pulseline",
            "connect",
            "/tmp/pulseline.sock",
            "--interval",
            "250ms",
            "--format",
            "json",
        ])
        .expect("connect args should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        let Command::Connect(args) = cli.command else {
            panic!("expected connect command");
        };
        assert_eq!(args.interval, "250ms");
        assert_eq!(args.duration, "600s");
    }

    #[test]
    fn rejects_unknown_log_level() {
        let err = Cli::try_parse_from(["pulseline", "--log-level", "loud", "version"])
            .expect_err("unknown level should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
