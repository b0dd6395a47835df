//! `jieqi-api` server binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jieqi_api::{router, AppStateInner, ServiceConfig};
use jieqi_core::SearchEngine;
use jieqi_engine::Engine;

#[derive(Parser, Debug)]
#[command(name = "jieqi-api", version, about = "Jieqi analysis web API")]
struct Args {
    /// Address to listen on
    #[arg(long)]
    bind: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Default search depth
    #[arg(long)]
    depth: Option<u8>,

    /// Default search time budget in milliseconds
    #[arg(long)]
    time_budget_ms: Option<u64>,

    /// Transposition table size in MiB
    #[arg(long)]
    tt_mb: Option<usize>,
}

impl Args {
    fn into_config(self) -> Result<ServiceConfig, jieqi_api::ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::load(path)?,
            None => ServiceConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(depth) = self.depth {
            config.default_depth = depth;
        }
        if let Some(ms) = self.time_budget_ms {
            config.default_time_budget_ms = ms;
        }
        if let Some(mb) = self.tt_mb {
            config.engine.tt_mb = mb;
        }
        Ok(config)
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Args::parse().into_config()?;

    let engine: Option<Box<dyn SearchEngine>> = match Engine::new(config.engine) {
        Ok(engine) => {
            info!(tt_mb = config.engine.tt_mb, "engine ready");
            Some(Box::new(engine))
        }
        Err(err) => {
            warn!(%err, "engine unavailable; analysis endpoints will answer 503");
            None
        }
    };

    let bind = config.bind.clone();
    let state = AppStateInner::new(engine, config);
    let app = router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %listener.local_addr()?, "jieqi api listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match Arc::try_unwrap(state) {
        Ok(inner) => drop(inner),
        Err(_) => warn!("engine still in use at shutdown"),
    }
    info!("server stopped");
    Ok(())
}
