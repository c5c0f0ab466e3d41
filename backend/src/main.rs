//! Main entry point for the authgate backend.
//!
//! This file initializes logging, loads configuration, sets up the database
//! connection, wires the services together and starts the Axum server.

mod api;
mod app;
mod auth;
mod config;
mod database;
mod errors;
mod middleware;
mod repositories;
mod services;
mod utils;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use config::Config;
use database::Database;
use middleware::LayerSettings;
use repositories::user_repository::UserRepository;
use services::user_service::UserService;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utils::jwt::TokenCodec;
use utils::password::PasswordHasher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        app_name = app::SERVICE_NAME,
        app_version = app::SERVICE_VERSION,
        "Setting up application"
    );

    let config = Config::from_env()?;
    let db = Database::new(&config).await?;
    db.migrate().await?;

    let codec = Arc::new(TokenCodec::from_config(&config));
    let store = Arc::new(UserRepository::new(db.pool().clone()));
    let user_service = Arc::new(UserService::new(
        store,
        PasswordHasher::new(),
        codec.as_ref().clone(),
    )?);

    let app = app::build_app(user_service, codec, &LayerSettings::from(&config));

    let bind_address = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;

    info!("Starting authgate server on port {}", config.server_port);
    axum::serve(
        listener,
        axum::ServiceExt::<axum::extract::Request>::into_make_service_with_connect_info::<
            SocketAddr,
        >(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
