//! Ingest command implementation.

use anyhow::{Context, Result};
use clap::Args;
use k2s_core::engine::{IngestionEngine, InvocationResponse};
use k2s_core::{Config, KinesisEvent};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::info;

/// Arguments for `k2s ingest`.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Event document to process (`-` or omitted reads stdin)
    #[arg(long)]
    pub event: Option<PathBuf>,

    /// Override sink location
    #[arg(long)]
    pub location: Option<String>,

    /// Override size threshold in bytes
    #[arg(long)]
    pub size_threshold: Option<u64>,

    /// Override time threshold in seconds
    #[arg(long)]
    pub time_threshold: Option<f64>,

    /// Write Prometheus metrics text to this file after the run
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,
}

/// Run one invocation and print its response.
pub async fn run(mut config: Config, args: IngestArgs) -> Result<()> {
    // Apply CLI overrides
    if let Some(location) = args.location {
        config.sink.location = location;
    }
    if let Some(bytes) = args.size_threshold {
        config.buffer.size_threshold_bytes = bytes;
    }
    if let Some(seconds) = args.time_threshold {
        config.buffer.time_threshold_seconds = seconds;
    }
    config.validate()?;

    let document = read_event(args.event.as_deref()).await?;
    let event = KinesisEvent::from_json(&document)?;

    let engine = IngestionEngine::new(&config)?;
    info!(
        location = %config.sink.location,
        records = event.len(),
        size_threshold_bytes = engine.policy().size_threshold_bytes,
        time_threshold_ms = %engine.policy().time_threshold.as_millis(),
        "Starting invocation"
    );

    let outcome = engine.run(&event.records).await;
    let response = InvocationResponse::from_outcome(&outcome);
    println!("{}", serde_json::to_string_pretty(&response)?);

    if let Some(path) = args.metrics_out {
        tokio::fs::write(&path, engine.metrics().export_prometheus_text())
            .await
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    outcome?;
    Ok(())
}

async fn read_event(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read event from {}", path.display())),
        _ => {
            let mut document = String::new();
            tokio::io::stdin()
                .read_to_string(&mut document)
                .await
                .context("Failed to read event from stdin")?;
            Ok(document)
        }
    }
}
