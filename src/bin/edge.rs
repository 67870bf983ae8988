//! Cellular Sentinel Edge Agent
//! =============================
//! Entry point for the edge detection daemon (C1-C7).
//!
//! Copyright © 2025 Stephen Bilodeau. All rights reserved.
//! Licensed under GPL-3.0.

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::fmt::format::json;

use cellular_sentinel::config::{self, EdgeConfig};
use cellular_sentinel::edge::acquisition::Acquisition;
use cellular_sentinel::edge::Orchestrator;
use cellular_sentinel::error::EdgeError;
use cellular_sentinel::model::Measurement;

/// Edge telemetry agent: ingest, detect, forward.
#[derive(Parser, Debug)]
#[command(name = "sentinel-edge", version)]
struct Args {
    /// Path to the edge config JSON file (created with defaults if absent).
    #[arg(long, default_value = "edge_config.json")]
    config: PathBuf,

    /// Override the monitor interval, in seconds.
    #[arg(long)]
    interval: Option<u64>,

    /// Print a one-line status report every tick.
    #[arg(long)]
    report: bool,

    /// Export accumulated threats to the given file on shutdown.
    #[arg(long)]
    export: Option<PathBuf>,
}

/// Acquisition has no real modem/platform binding in this crate (spec.md §6
/// leaves it to the platform layer); this reports unavailable on every call
/// so the orchestrator always takes the "skip tick" path until a real
/// implementation is wired in.
struct UnimplementedAcquisition;

#[async_trait::async_trait]
impl Acquisition for UnimplementedAcquisition {
    async fn acquire(&self) -> Result<Option<Measurement>, EdgeError> {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .event_format(json())
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    info!("Starting Cellular Sentinel edge agent v{}", cellular_sentinel::VERSION);

    let mut cfg: EdgeConfig = match config::load_or_init(args.config.to_str().unwrap_or("edge_config.json")) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, "failed to load edge config; using built-in defaults");
            EdgeConfig::default()
        }
    };
    if let Some(interval) = args.interval {
        cfg.interval_seconds = interval;
    }

    let interval = std::time::Duration::from_secs(cfg.interval_seconds.max(1));
    let mut orchestrator = Orchestrator::new(cfg, Box::new(UnimplementedAcquisition));
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

    let ctrl_c = tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    if args.report {
        info!("report mode enabled: logging one line per tick");
    }

    let mut exported_threats: Vec<serde_json::Value> = Vec::new();
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let threats = orchestrator.tick().await;
                if args.report {
                    info!(threats_detected = threats.len(), "tick complete");
                }
                if args.export.is_some() {
                    for t in &threats {
                        exported_threats.push(serde_json::to_value(t)?);
                        if exported_threats.len() > 100 {
                            exported_threats.remove(0);
                        }
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    ctrl_c.abort();

    if let Some(export_path) = args.export {
        let snapshot = serde_json::json!({
            "export_timestamp": chrono::Utc::now().to_rfc3339(),
            "total_threats": exported_threats.len(),
            "threats": exported_threats,
        });
        std::fs::write(&export_path, serde_json::to_string_pretty(&snapshot)?)?;
        info!(path = ?export_path, "exported accumulated threats");
    }

    info!("edge agent shut down cleanly");
    Ok(())
}
