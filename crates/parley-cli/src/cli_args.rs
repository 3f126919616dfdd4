use std::path::PathBuf;

use clap::{ArgAction, Parser};
use parley_telemetry::TelemetryOptions;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "parley-replay",
    about = "Replay a conversation turn fixture with message telemetry attached",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "PARLEY_REPLAY_FIXTURE",
        help = "Turn replay fixture (JSON, schema_version 1)"
    )]
    pub fixture: PathBuf,

    #[arg(
        long = "instrumentation-key",
        env = "PARLEY_INSTRUMENTATION_KEY",
        help = "Instrumentation key stamped on every telemetry event; must not be blank"
    )]
    pub instrumentation_key: String,

    #[arg(
        long = "include-sender-name",
        env = "PARLEY_TELEMETRY_INCLUDE_SENDER_NAME",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Include sender and recipient display names in telemetry properties"
    )]
    pub include_sender_name: bool,

    #[arg(
        long = "include-original-text",
        env = "PARLEY_TELEMETRY_INCLUDE_ORIGINAL_TEXT",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Include message text in telemetry properties"
    )]
    pub include_original_text: bool,

    #[arg(
        long = "telemetry-log",
        env = "PARLEY_TELEMETRY_LOG",
        help = "Optional NDJSON file receiving telemetry_event_v1 records"
    )]
    pub telemetry_log: Option<PathBuf>,

    #[arg(
        long = "telemetry-queue-capacity",
        default_value_t = 256,
        value_parser = parse_positive_usize,
        help = "Bounded queue size in front of the telemetry log writer"
    )]
    pub telemetry_queue_capacity: usize,

    #[arg(
        long = "report-out",
        help = "Also write the replay report to this path (atomic replace)"
    )]
    pub report_out: Option<PathBuf>,
}

impl Cli {
    pub fn telemetry_options(&self) -> TelemetryOptions {
        TelemetryOptions::new(self.instrumentation_key.clone())
            .with_sender_name(self.include_sender_name)
            .with_original_text(self.include_original_text)
    }
}
