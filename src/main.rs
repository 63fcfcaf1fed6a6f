mod binpath;
mod config;
mod diagnostics;
mod guardian;
mod notify;
mod probe;
mod restart_log;

use clap::Parser;
use std::path::PathBuf;

/// Restart Guard guardian: an independent watchdog spawned detached from
/// a gateway restart. Polls gateway health until it is healthy or the
/// deadline elapses, appends the outcome to the restart log, notifies
/// the operator, and removes the lock file.
///
/// Exit codes: 0 = gateway healthy, 1 = timed out, 2 = bad configuration.
#[derive(Parser, Debug)]
#[command(name = "restart-guard", version, about)]
struct Cli {
    /// Path to restart-guard.toml
    #[arg(short, long)]
    config: PathBuf,

    /// Extra logging (per-probe outcomes, notification decisions)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "restart_guard=debug"
    } else {
        "restart_guard=info"
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.parse().unwrap()),
        )
        .init();

    let config = match config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("restart-guard: {e}");
            std::process::exit(2);
        }
    };

    let oc_bin = binpath::find_openclaw(&config.paths.openclaw_bin);
    match &oc_bin {
        Some(bin) => tracing::info!(bin = %bin.display(), "resolved openclaw binary"),
        None => tracing::info!("no openclaw binary found, probing over HTTP"),
    }

    let probe = match probe::GatewayProbe::new(oc_bin.clone(), &config.gateway) {
        Ok(probe) => probe,
        Err(e) => {
            eprintln!("restart-guard: {e}");
            std::process::exit(2);
        }
    };
    let notifier = match notify::Notifier::new(&config) {
        Ok(notifier) => notifier,
        Err(e) => {
            eprintln!("restart-guard: {e}");
            std::process::exit(2);
        }
    };

    let guardian = guardian::Guardian::new(config, oc_bin, notifier);
    let code = guardian.run(&probe).await;
    std::process::exit(code);
}
