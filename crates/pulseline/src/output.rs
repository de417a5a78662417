use std::io::{IsTerminal, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pulseline_session::{SessionHandle, StatsSnapshot, TerminationReason};
use pulseline_transport::Endpoint;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    event: &'static str,
    session: String,
    peer: &'a str,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    event: &'static str,
    session: String,
    peer: &'a str,
    reason: String,
    elapsed_ms: u64,
    #[serde(flatten)]
    stats: StatsSnapshot,
}

#[derive(Serialize)]
struct ShutdownOutput {
    event: &'static str,
    endpoint: String,
    sessions_closed: usize,
    timestamp: String,
}

impl ShutdownOutput {
    fn new(endpoint: &Endpoint, sessions_closed: usize) -> Self {
        Self {
            event: "shutdown",
            endpoint: endpoint.to_string(),
            sessions_closed,
            timestamp: unix_timestamp(),
        }
    }
}

pub fn print_message(session: &SessionHandle, payload: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                event: "message",
                session: session.id().to_string(),
                peer: session.peer(),
                payload_size: payload.len(),
                payload: payload_preview(payload),
                timestamp: unix_timestamp(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SESSION", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    session.id().to_string(),
                    payload.len().to_string(),
                    session.peer().to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} size={} peer={} payload={}",
                session.id(),
                payload.len(),
                session.peer(),
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = out.write_all(payload);
            let _ = out.write_all(b"\n");
            let _ = out.flush();
        }
    }
}

pub fn print_summary(
    session: &SessionHandle,
    reason: &TerminationReason,
    elapsed: Duration,
    format: OutputFormat,
) {
    let stats = session.stats().snapshot();
    match format {
        OutputFormat::Json => {
            let out = SummaryOutput {
                event: "summary",
                session: session.id().to_string(),
                peer: session.peer(),
                reason: reason.to_string(),
                elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                stats,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in summary_rows(reason, elapsed, &stats) {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for (field, value) in summary_rows(reason, elapsed, &stats) {
                eprintln!("{field}: {value}");
            }
        }
    }
}

/// Report a listener that stopped accepting and closed its sessions.
pub fn print_shutdown(endpoint: &Endpoint, sessions_closed: usize, format: OutputFormat) {
    let out = ShutdownOutput::new(endpoint, sessions_closed);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ENDPOINT", "SESSIONS CLOSED"])
                .add_row(vec![out.endpoint, out.sessions_closed.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            eprintln!(
                "shut down {} after closing {} session(s)",
                out.endpoint, out.sessions_closed
            );
        }
    }
}

fn summary_rows(
    reason: &TerminationReason,
    elapsed: Duration,
    stats: &StatsSnapshot,
) -> Vec<(&'static str, String)> {
    vec![
        ("reason", reason.to_string()),
        ("elapsed", format!("{:.3}s", elapsed.as_secs_f64())),
        ("data_sent", stats.data_sent.to_string()),
        ("data_received", stats.data_received.to_string()),
        ("probes_sent", stats.probes_sent.to_string()),
        ("probes_received", stats.probes_received.to_string()),
        ("replies_sent", stats.replies_sent.to_string()),
        ("replies_received", stats.replies_received.to_string()),
    ]
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

/// Wall-clock time as unix `seconds.millis`.
pub fn unix_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:03}", now.as_secs(), now.subsec_millis())
}
