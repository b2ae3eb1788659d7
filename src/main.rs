//! AssistNow AGNSS fetch client
//!
//! A command-line client that obtains Assisted-GNSS correction data from
//! the AssistNow service and hands it to a local GPS daemon. The payload
//! goes to stdout (or a file selected with `output=PATH`); all diagnostics
//! go to stderr.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use assistnow::cache::CacheStore;
use assistnow::cli::{self, Cli};
use assistnow::gateway::AssistNowClient;
use assistnow::orchestrator::Orchestrator;
use assistnow::state::StateStore;

#[tokio::main]
async fn main() -> ExitCode {
    // Payload bytes own stdout; every log line goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let invocation = match cli::invocation_from_cli(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };

    let Some(state_store) = StateStore::new() else {
        error!("Could not determine a config directory for persisted state");
        return ExitCode::from(5);
    };
    let Some(cache_store) = CacheStore::new() else {
        error!("Could not determine a cache directory");
        return ExitCode::from(5);
    };
    let client = match AssistNowClient::new() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize HTTP client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = Orchestrator::new(state_store, cache_store, client);
    match orchestrator.run(&invocation).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
