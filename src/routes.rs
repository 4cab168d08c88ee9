//! Router assembly
//! Mission: Wire the auth services into public and token-protected routes

use crate::{
    auth::{
        api as auth_api, auth_middleware, AuthState, CookieSettings, CredentialVerifier,
        SessionService, SigningKeys, SqliteRefreshTokenStore, SqliteUserStore, TokenCodec,
        TokenVerifier, UserStore,
    },
    db::Db,
    middleware::request_logging,
};
use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Build the auth state and gate verifier over one database and keypair.
pub fn build_auth(
    db: Db,
    keys: Arc<SigningKeys>,
    bcrypt_cost: u32,
    cookies: CookieSettings,
) -> Result<(AuthState, Arc<dyn TokenVerifier>)> {
    let users: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(db.clone()));
    let tokens = Arc::new(SqliteRefreshTokenStore::new(db));
    let codec = Arc::new(TokenCodec::new(keys));

    let credentials = Arc::new(
        CredentialVerifier::new(users.clone(), bcrypt_cost)
            .context("Failed to initialize credential verifier")?,
    );
    let sessions = Arc::new(SessionService::new(
        codec.clone(),
        credentials.clone(),
        tokens,
    ));

    let state = AuthState::new(sessions, credentials, users, cookies);
    let verifier: Arc<dyn TokenVerifier> = codec;
    Ok((state, verifier))
}

/// CORS for a single browser origin that sends cookies
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(allowed_origin)
        .with_context(|| format!("Invalid CORS origin: {allowed_origin}"))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}

pub fn build_router(
    state: AuthState,
    verifier: Arc<dyn TokenVerifier>,
    cors: CorsLayer,
) -> Router {
    // Login, registration and refresh are reachable without a token
    let auth_routes = Router::new()
        .route("/auth/register", post(auth_api::register))
        .route("/auth/login", post(auth_api::login))
        .route("/auth/refresh-token", post(auth_api::refresh_token))
        .with_state(state.clone());

    // Protected API routes
    let protected_routes = Router::new()
        .route("/api/me", get(auth_api::get_current_user))
        .route("/api/me/password", put(auth_api::update_password))
        .route("/api/logout", post(auth_api::logout))
        .route_layer(middleware::from_fn_with_state(verifier, auth_middleware))
        .with_state(state);

    let public_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(auth_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(cors)
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
