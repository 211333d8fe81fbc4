mod auth;
mod clusters;
mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use sl_broadcast::{
    GroupRegistry,
    GroupTuning,
    InformerRegistry,
    LogOnlyStatusSync,
};
use sl_core::logging;
use sl_core::prelude::*;
use tokio::sync::watch;
use tracing::*;

use crate::auth::StaticAuthorizer;
use crate::clusters::ClusterPool;
use crate::config::ServerConfig;
use crate::routes::AppState;

#[derive(Parser, Debug)]
struct Options {
    #[arg(short, long)]
    config_file: String,

    #[arg(long, default_value = "9091")]
    server_port: u16,

    #[arg(short, long, default_value = "info")]
    verbosity: String,
}

#[instrument(ret, err)]
async fn run(args: Options) -> EmptyResult {
    let config = Arc::new(ServerConfig::load(&args.config_file)?);

    let pool = Arc::new(ClusterPool::new(config.clone()));
    let informers = Arc::new(InformerRegistry::new(pool));

    // Managers watch this channel; flipping it on shutdown is what stops every sweep loop.
    // Informers are left running, the process exit collects them.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let groups = Arc::new(GroupRegistry::new(
        Arc::new(LogOnlyStatusSync),
        GroupTuning::default(),
        shutdown_rx,
    ));

    let state = AppState {
        config: config.clone(),
        authorizer: Arc::new(StaticAuthorizer::new(config)),
        informers,
        groups,
    };

    let app = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.server_port)).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;
    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> EmptyResult {
    let args = Options::parse();
    logging::setup(&args.verbosity);
    run(args).await
}
