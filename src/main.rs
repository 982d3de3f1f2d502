//! This project is split in 3 main modules:
//!
//! - [storefront] (the API the web storefront talks to)
//! - [mpesa] (payment gateway integration)
//! - [brevo] (email and contacts provider integration)
#![doc = include_str!("../README.md")]

use std::net::{Ipv4Addr, SocketAddrV4};

use anyhow::Context;
use axum::Router;
use tracing_subscriber::EnvFilter;

/// Deadline wrapper for outbound provider calls
mod bounded;
/// Email and contacts provider integration
///
/// Sends transactional emails and manages newsletter contacts through Brevo.
mod brevo;
mod config;
mod cors;
mod db;
mod mask;
/// Payment gateway integration
///
/// This module defines the types and methods to communicate with M-Pesa Daraja: OAuth tokens, STK push and result callbacks.
mod mpesa;
mod state;
/// Storefront API
///
/// Orders, payment initiation and newsletter signups as consumed by the web client.
mod storefront;
#[cfg(test)]
mod testing;

fn app(state: state::AppState) -> Router {
    let cors = cors::build_cors(&state.config.allowed_origins);
    Router::new()
        .nest("/api", storefront::api::router())
        .nest("/mpesa", mpesa::api::router())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .init();

    match dotenvy::dotenv() {
        Ok(p) => tracing::info!(path = %p.display(), "Loaded environment variables from .env file"),
        Err(e) => tracing::warn!("Failed to load environment variables from .env: {e}"),
    };
    let config = config::Config::from_env().context("invalid configuration")?;
    tracing::info!(
        mpesa_environment = ?config.mpesa.environment,
        origins = ?config.allowed_origins,
        "Configuration loaded"
    );

    let db = db::Db::connect(&config.database_url)
        .await
        .context("database is not available")?;
    let port = config.port;
    let state = state::AppState::new(config, db).context("failed to build http client")?;

    let listener = tokio::net::TcpListener::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;

    tracing::info!("Serving on port {port}");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
