mod api;
mod cli;
mod shutdown;

use std::sync::Arc;

use clap::Parser;
use farm_engine::FarmState;
use tokio::sync::{watch, RwLock};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::shutdown::{spawn_ctrl_c_handler, ShutdownController, ShutdownEvent};

fn load_config(cli: &Cli) -> anyhow::Result<farm_core::Configuration> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
            toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?
        }
        None => farm_core::Configuration::default(),
    };
    if let Some(bind_addr) = &cli.bind_addr {
        config.operator_bind_addr = bind_addr.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config(&cli)?;
    tracing::info!(bind_addr = %config.operator_bind_addr, "starting coordinator");

    let farm = Arc::new(RwLock::new(FarmState::new()));
    let health: farm_engine::periodic::SharedTickHealth = Arc::new(std::sync::Mutex::new(Default::default()));

    let (shutdown_watch_tx, shutdown_watch_rx) = watch::channel(false);
    let shutdown = Arc::new(ShutdownController::new());
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::unbounded_channel::<ShutdownEvent>();
    spawn_ctrl_c_handler(shutdown.clone(), shutdown_tx);

    let listener = tokio::net::TcpListener::bind(&config.operator_bind_addr).await?;
    let app = api::router(farm.clone(), health.clone(), config.clone());
    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "operator API server stopped");
        }
    });

    let mut control_loop = tokio::spawn(farm_engine::periodic::run(
        farm.clone(),
        config,
        shutdown_watch_rx,
        health,
    ));

    loop {
        tokio::select! {
            ev = shutdown_rx.recv() => {
                match ev {
                    Some(ShutdownEvent::Graceful) => {
                        tracing::info!(
                            "shutdown requested, finishing in-flight work (press CTRL+C again to exit immediately)"
                        );
                        let _ = shutdown_watch_tx.send(true);
                    }
                    Some(ShutdownEvent::Immediate) => {
                        tracing::warn!("shutdown requested again, exiting immediately");
                        server.abort();
                        control_loop.abort();
                        return Ok(());
                    }
                    None => break,
                }
            }
            _ = &mut control_loop => break,
        }
    }

    server.abort();
    Ok(())
}
