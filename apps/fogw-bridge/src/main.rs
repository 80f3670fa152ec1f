use anyhow::{Context, Result};
use clap::Parser;
use fogw_bridge::acquisition::AcquisitionEvent;
use fogw_bridge::cli::Args;
use fogw_bridge::config::Config;
use futures::StreamExt;
use serde::Serialize;
use std::io::Write;

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,fogw_bridge=info".into());
    // stdout carries records; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let line = serde_json::to_string(value).context("failed to serialize output")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(unit_system) = args.unit_system {
        config.unit_system = unit_system;
    }

    let driver = fogw_bridge::loader(&config)?;

    if args.once {
        let record = driver
            .poll_once()
            .await
            .with_context(|| format!("poll of {} failed", driver.endpoint().url()))?;
        return print_json(&record);
    }

    let mut records = driver.records();
    let stats = records.stats();
    loop {
        tokio::select! {
            event = records.next() => {
                let Some(event) = event else {
                    tracing::warn!("acquisition loop ended");
                    break;
                };
                if let AcquisitionEvent::HardFailure(hard) = &event {
                    tracing::error!(
                        consecutive_failures = hard.consecutive_failures,
                        last_error = %hard.last_error,
                        "gateway needs attention"
                    );
                }
                print_json(&event)?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    records.shutdown().await;
    let snapshot = stats.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        records = snapshot.records,
        hard_failures = snapshot.hard_failures,
        "fogw-bridge stopped"
    );
    Ok(())
}
