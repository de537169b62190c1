use clap::Parser;
use portal_chooser::app::host::{HostCall, JournalHost};
use portal_chooser::app::{ActionOutcome, ChooserAction, UserEvent};
use portal_chooser::config::{settings, ChooserConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Shows the desktop file chooser for one configured action and applies the pick.
#[derive(Parser)]
#[command(name = "portal-chooser", version, about)]
struct Args {
    /// Action to run: `save-project`, `open-project` or a profile from the config file
    action_id: String,

    /// Path of the document currently open in the host
    document: Option<PathBuf>,

    /// Config file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,
}

/// What the driver prints on stdout once the action has finished.
#[derive(Serialize)]
struct Report {
    action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<ActionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    host_calls: Vec<HostCall>,
    messages: Vec<UserEvent>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the JSON report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let action_id = args.action_id;

    let loaded = match &args.config {
        Some(path) => settings::load_config(Some(path)),
        None => ChooserConfig::load(),
    };
    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        ChooserConfig::default()
    });

    let Some(profile) = config.profile(&action_id) else {
        tracing::error!("Unknown action '{}'", action_id);
        return ExitCode::from(2);
    };

    let action = match ChooserAction::from_config(profile, &config) {
        Ok(action) => action,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Ctrl-C closes the dialog instead of leaving the helper behind.
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut host = JournalHost::new(args.document);
    let result = action.run(&mut host, &event_tx, &cancel).await;
    drop(event_tx);

    let mut messages = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        eprintln!("{}", event.message());
        messages.push(event);
    }

    let failed = result.is_err();
    let (outcome, error) = match result {
        Ok(outcome) => (Some(outcome), None),
        Err(e) => (None, Some(e.to_string())),
    };
    let report = Report {
        action: action_id,
        outcome,
        error,
        host_calls: host.calls,
        messages,
    };
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to serialize report: {}", e),
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
