//! Cellular Sentinel Aggregation Server
//! =====================================
//! Entry point for the aggregation server (C8-C11).
//!
//! Copyright © 2025 Stephen Bilodeau. All rights reserved.
//! Licensed under GPL-3.0.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::fmt::format::json;

use cellular_sentinel::config::{self, ServerConfig};
use cellular_sentinel::server::{router, run_reaper, ApiKeyStore, AppState, Correlator, SessionTable, ThreatStore};

#[derive(Parser, Debug)]
#[command(name = "sentinel-server", version)]
struct Args {
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    ssl: bool,

    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let filter = if args.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().event_format(json()).with_env_filter(filter).init();

    info!("Starting Cellular Sentinel aggregation server v{}", cellular_sentinel::VERSION);

    let mut cfg: ServerConfig = config::load_or_init("server_config.json").unwrap_or_default();
    if let Some(host) = args.host {
        cfg.host = host;
    }
    if let Some(port) = args.port {
        cfg.port = port;
    }
    if args.ssl {
        cfg.ssl_enabled = true;
    }

    let api_keys = match ApiKeyStore::load_or_generate(&cfg.api_key_file) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "fatal: could not load or create API key file");
            std::process::exit(1);
        }
    };

    let store = match ThreatStore::open(&cfg.database_path).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "fatal: could not open threat store");
            std::process::exit(1);
        }
    };

    let bind_addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, addr = %bind_addr, "fatal: could not bind server address");
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        correlator: Correlator::new(cfg.clone()),
        sessions: SessionTable::new(),
        started_at: chrono::Utc::now(),
        config: cfg,
        store,
        api_keys,
    });

    let reaper_state = state.clone();
    let reaper = tokio::spawn(run_reaper(reaper_state));

    info!(addr = %bind_addr, "listening for device connections");
    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    reaper.abort();
    info!("server shut down cleanly");
    Ok(())
}
