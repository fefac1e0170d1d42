use std::process::ExitCode;

use clap::Parser as _;
use tokio::{
    select,
    signal::unix::{SignalKind, signal},
};
use tracing::{error, info, level_filters::LevelFilter, warn};
use yieldhop_core::{
    config::{PipelineConfig, Secrets},
    pipeline::Outcome,
};

use crate::cli::Cli;

mod cli;
mod telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = color_eyre::install() {
        eprintln!("Failed to install error handler: {err}");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();

    if let Err(err) = tolerate_missing_env_file(dotenvy::dotenv()) {
        eprintln!("Failed to load .env file: {err}");
        return ExitCode::FAILURE;
    }

    let config = match PipelineConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err:?}");
            return ExitCode::FAILURE;
        }
    };
    let secrets = match Secrets::from_env() {
        Ok(secrets) => secrets,
        Err(err) => {
            eprintln!("Failed to load secrets: {err:?}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("starting with config:\n{config:?}");

    telemetry::init_subscriber(telemetry::get_subscriber(LevelFilter::INFO));

    let command_jh = tokio::spawn(cli.run(config, secrets));

    let mut sigterm = signal(SignalKind::terminate())
        .expect("setting sigterm listener on unix should always work");
    let mut sigint = signal(SignalKind::interrupt())
        .expect("setting sigint listener on unix should always work");

    // Submitted transactions are not cancelled, an interrupted run may still land on-chain
    select! {
        res = command_jh => match res {
            Ok(Ok(Outcome::Done(summary))) => {
                match &summary.supply {
                    Ok(receipt) => info!(supply_tx = %receipt.hash, "script executed successfully"),
                    Err(e) => warn!(error = %e, "script finished without supplying"),
                }
                ExitCode::SUCCESS
            }
            // already logged by the pipeline
            Ok(Ok(Outcome::Failed { .. })) => ExitCode::FAILURE,
            Ok(Err(e)) => {
                error!(error = ?e, "pipeline could not start");
                ExitCode::FAILURE
            }
            Err(e) => {
                error!(%e, "pipeline task exited unexpectedly");
                ExitCode::FAILURE
            }
        },
        _ = sigterm.recv() => {
            info!("received SIGTERM signal, in-flight transactions are not cancelled");
            ExitCode::FAILURE
        }
        _ = sigint.recv() => {
            info!("received SIGINT signal, in-flight transactions are not cancelled");
            ExitCode::FAILURE
        }
    }
}

/// A missing `.env` is fine, the variables may come from the environment. A
/// malformed one is not, dotenvy stops at the first bad line.
fn tolerate_missing_env_file<T>(loaded: dotenvy::Result<T>) -> dotenvy::Result<()> {
    match loaded {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(err),
    }
}
