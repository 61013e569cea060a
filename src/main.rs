//! roomdiff - compare Matrix room state across homeservers.

use clap::Parser;
use roomdiff::client::{HomeserverClient, MatrixClient};
use roomdiff::config::{Config, DEFAULT_CONFIG_PATH, OutputFormat, validate};
use roomdiff::error::StartupError;
use roomdiff::reconcile::{DivergenceReport, RunOutcome, run};
use roomdiff::telemetry::{self, LogFormat};
use roomdiff::{metrics, report};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Instrument, error, info, warn};

/// Compare Matrix room state across homeservers.
#[derive(Debug, Parser)]
#[command(name = "roomdiff", version, about)]
struct Args {
    /// Config file (.json is read as JSON, anything else as TOML).
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Room IDs to compare; a missing leading `!` is added.
    #[arg(value_name = "ROOM_ID")]
    rooms: Vec<String>,

    /// Report format on stdout (overrides `output.format`).
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Log format on stderr.
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Exit with status 2 if any room diverged or was not fully reachable.
    #[arg(long)]
    fail_on_divergence: bool,
}

fn build_clients(config: &Config) -> Result<Vec<Arc<dyn HomeserverClient>>, StartupError> {
    config
        .homeservers
        .iter()
        .map(|hs| {
            MatrixClient::new(hs, &config.timeouts)
                .map(|client| Arc::new(client) as Arc<dyn HomeserverClient>)
                .map_err(|source| StartupError::EndpointInit {
                    endpoint: hs.label().to_string(),
                    source,
                })
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    telemetry::init(args.log_format);

    let run_id = uuid::Uuid::new_v4().to_string();
    let span = telemetry::spans::run(&run_id);

    let config = Config::load(&args.config).map_err(|source| {
        let err = StartupError::Config {
            path: args.config.display().to_string(),
            source,
        };
        error!(error = %err, "Failed to load config");
        err
    })?;

    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid config");
        }
        return Err(StartupError::Validation(errors).into());
    }

    metrics::init();

    let format = args.format.unwrap_or(config.output.format);
    let list_extra_events = config.output.list_extra_events;

    info!(
        run_id = %run_id,
        homeservers = config.homeservers.len(),
        rooms = args.rooms.len(),
        "Starting roomdiff"
    );

    let clients = build_clients(&config)?;
    let print_report = |report: &DivergenceReport| match format {
        OutputFormat::Text => println!("{}", report::format_report(report, list_extra_events)),
        OutputFormat::Json => match report::format_json_line(report, &run_id, chrono::Utc::now()) {
            Ok(line) => println!("{}", line),
            Err(e) => error!(room = %report.room_id, error = %e, "Failed to serialize report"),
        },
    };

    let outcome = run(clients, &args.rooms, config.timeouts.request(), print_report)
        .instrument(span)
        .await
        .map_err(|e| {
            error!(error = %e, error_code = e.error_code(), "Aborting run");
            e
        })?;

    if let Some(path) = &config.metrics.textfile {
        if let Err(e) = metrics::write_textfile(path) {
            warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
        }
    }

    match &outcome {
        RunOutcome::NoRooms => println!("roomId not specified, not proceeding."),
        RunOutcome::NotEnoughEndpoints { configured } => println!(
            "{} homeserver(s) configured, at least 2 are needed to compare, not proceeding.",
            configured
        ),
        RunOutcome::Completed(reports) => info!(
            rooms = reports.len(),
            needs_attention = reports.iter().filter(|r| r.needs_attention()).count(),
            "Run complete"
        ),
    }

    Ok(ExitCode::from(outcome.exit_status(args.fail_on_divergence)))
}
