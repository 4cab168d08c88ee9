//! TIL API server

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use til_backend::{
    auth::{SigningKeys, SqliteRefreshTokenStore},
    build_auth, build_router,
    config::{load_env, Config},
    cors_layer, db,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();

    let config = Config::parse();

    info!("🚀 TIL API starting");
    if !config.is_production() {
        info!("🛠️ Development mode (ENV=dev)");
    }

    // Without a keypair no token can be issued or checked
    let keys = Arc::new(
        SigningKeys::load(
            &config.key_root,
            config.jwt_private_key_path.as_deref(),
            config.jwt_public_key_path.as_deref(),
        )
        .context("Failed to load JWT signing keys")?,
    );

    let db = db::open(&config.database_path)?;
    info!("📊 Database initialized at: {}", config.database_path);

    match SqliteRefreshTokenStore::new(db.clone()).purge_expired() {
        Ok(0) => {}
        Ok(removed) => info!(removed, "🧹 Purged expired refresh tokens"),
        Err(e) => warn!("Failed to purge expired refresh tokens: {e:#}"),
    }

    let (auth_state, verifier) =
        build_auth(db, keys, config.bcrypt_cost, config.cookie_settings())?;
    info!("🔐 Authentication initialized");

    let app = build_router(
        auth_state,
        verifier,
        cors_layer(&config.cors_allowed_origin)?,
    );

    // Start server
    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("👋 Server stopped");
    Ok(())
}

/// Initialize tracing with env-driven filtering
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "til_backend=debug,til_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
