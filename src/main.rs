use anyhow::Result;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use services::{
    download_service, file_sink::OsFileSink, gcs_client::GcsClient, listing::Listing,
};

#[tokio::main]
async fn main() -> ExitCode {
    // --- Logging setup (stderr, so stdout carries only the listing) ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // --- Parse config ---
    let cfg = config::DownloadConfig::from_env_and_args()?;
    tracing::info!("Starting gsdownload with config: {:?}", cfg);

    // --- Cancel in-flight work on Ctrl-C ---
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling downloads");
            on_interrupt.cancel();
        }
    });

    let listing = Listing::stdout(cfg.verbose);
    let dry_run = cfg.dry_run;
    let summary = download_service::execute(
        cfg,
        GcsClient::new(),
        OsFileSink::new(),
        listing,
        &cancel,
    )
    .await?;

    if dry_run {
        tracing::info!("Dry run finished, {} objects listed", summary.objects);
    } else {
        tracing::info!(
            "Finished, downloaded {} objects ({} bytes)",
            summary.objects,
            summary.bytes
        );
    }
    Ok(())
}
