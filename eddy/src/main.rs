use std::process::ExitCode;

use clap::{Parser, Subcommand};
use snafu::ErrorCompat;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{error::CliError, normalize::NormalizeArgs, run::RunArgs};

mod error;
mod normalize;
mod run;

#[derive(Parser)]
#[command(name = "eddy")]
#[command(about = "Streams analytics events from Kafka into a Delta Lake table")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume the topic and append batches to the table until stopped
    Run {
        #[clap(flatten)]
        inner: RunArgs,
    },
    /// Normalize newline-delimited JSON messages and print the result
    Normalize {
        #[clap(flatten)]
        inner: NormalizeArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let ct = CancellationToken::new();
    tokio::spawn({
        let ct = ct.clone();
        async move {
            wait_for_shutdown_signal().await;
            info!("Shutdown signal received");
            ct.cancel();
        }
    });

    let result = match cli.command {
        Commands::Run { inner } => inner.run(ct).await,
        Commands::Normalize { inner } => inner.run(ct).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::from(err.kind().exit_code())
        }
    }
}

fn report(err: &CliError) {
    eprintln!("Error: {err}");
    for cause in err.iter_chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
        let _ = tokio::signal::ctrl_c().await;
        return;
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
