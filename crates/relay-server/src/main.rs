use std::process::ExitCode;

use clap::Parser;
use relay_config::{RelayConfig, ServerArgs};
use relay_core::Orchestrator;

fn main() -> ExitCode {
    let args = ServerArgs::parse();
    init_tracing(args.verbose);

    if args.info {
        println!("relay-server {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let config = match RelayConfig::load(&args) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "relay-server: couldn't load configuration");
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = match Orchestrator::new(config) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            tracing::error!(%err, "relay-server: couldn't assemble mode topology");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(mode = %orchestrator.mode(), "relay-server: starting");
    if let Err(err) = orchestrator.run() {
        tracing::error!(%err, "relay-server: pipeline failed");
        return ExitCode::FAILURE;
    }
    tracing::info!("relay-server: shut down cleanly");
    ExitCode::SUCCESS
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
