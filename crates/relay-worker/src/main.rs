use std::process::ExitCode;

use clap::Parser;
use relay_comm::InterruptFlag;
use relay_config::WorkerArgs;
use relay_net::RelayEndpoint;
use relay_worker::WorkerRunner;

fn main() -> ExitCode {
    let args = WorkerArgs::parse();
    init_tracing(args.verbose);

    let Some(command) = args.command else {
        tracing::error!("relay-worker: --command is required");
        return ExitCode::FAILURE;
    };

    let endpoint = match RelayEndpoint::parse(&args.endpoint) {
        Ok(endpoint) => endpoint,
        Err(err) => {
            tracing::error!(%err, "relay-worker: bad --endpoint");
            return ExitCode::FAILURE;
        }
    };

    let interrupt = InterruptFlag::new();
    if let Err(err) = interrupt.install() {
        tracing::error!(%err, "relay-worker: couldn't install signal handlers");
        return ExitCode::FAILURE;
    }

    let runner = WorkerRunner::new(command, args.args);
    tracing::info!(endpoint = %args.endpoint, threads = args.thread, "relay-worker: starting");
    if let Err(err) = relay_worker::pool::run(&endpoint, runner, args.thread, interrupt) {
        tracing::error!(%err, "relay-worker: listener failed");
        return ExitCode::FAILURE;
    }
    tracing::info!("relay-worker: shut down cleanly");
    ExitCode::SUCCESS
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
