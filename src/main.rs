use anyhow::Context;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::{error, info};

mod config;
mod db;
mod handlers;
mod llm;
mod prompt;
mod state;
mod utils;

use config::CONFIG;
use db::database::Database;
use state::AppState;
use utils::http::get_http_client;
use utils::logging::init_logging;

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _guards = init_logging(&CONFIG.log_level);
    info!("Starting CodeBeasts server");

    let db = Database::init(&CONFIG.database_url, CONFIG.database_max_connections)
        .await
        .context("failed to open database")?;
    let state = AppState::from_config(db, get_http_client(), &CONFIG);
    let app = handlers::router(state);

    let listener = TcpListener::bind(&CONFIG.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", CONFIG.bind_addr))?;
    info!("Listening on {}", CONFIG.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
