//! Authentication API Endpoints
//! Mission: Provide login, token refresh and account endpoints

use crate::auth::{
    credentials::CredentialVerifier,
    error::AuthError,
    middleware::{AuthUser, ACCESS_TOKEN_COOKIE},
    models::{
        LoginRequest, NewUser, RefreshRequest, RegisterRequest, TokenKind, TokenPair,
        UpdatePasswordRequest, UserResponse,
    },
    session::SessionService,
    user_store::{UserStore, UserStoreError},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{error, info, warn};

/// How the access token cookie is written
#[derive(Debug, Clone, Default)]
pub struct CookieSettings {
    /// Production: `Secure; SameSite=None`. Otherwise `SameSite=Lax`.
    pub secure: bool,
    pub domain: Option<String>,
}

impl CookieSettings {
    pub fn access_cookie(&self, token: &str) -> String {
        self.build(token, TokenKind::Access.ttl().num_seconds())
    }

    /// Expires the cookie immediately
    pub fn cleared_cookie(&self) -> String {
        self.build("", 0)
    }

    fn build(&self, value: &str, max_age: i64) -> String {
        let mut cookie =
            format!("{ACCESS_TOKEN_COOKIE}={value}; HttpOnly; Path=/; Max-Age={max_age}");

        if self.secure {
            cookie.push_str("; Secure; SameSite=None");
        } else {
            cookie.push_str("; SameSite=Lax");
        }

        if let Some(domain) = self.domain.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(cookie, "; Domain={domain}");
        }

        cookie
    }
}

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<SessionService>,
    pub credentials: Arc<CredentialVerifier>,
    pub users: Arc<dyn UserStore>,
    pub cookies: CookieSettings,
}

impl AuthState {
    pub fn new(
        sessions: Arc<SessionService>,
        credentials: Arc<CredentialVerifier>,
        users: Arc<dyn UserStore>,
        cookies: CookieSettings,
    ) -> Self {
        Self {
            sessions,
            credentials,
            users,
            cookies,
        }
    }

    fn token_response(&self, pair: TokenPair) -> Response {
        let cookie = self.cookies.access_cookie(&pair.access_token);
        ([(header::SET_COOKIE, cookie)], Json(pair)).into_response()
    }
}

/// Register endpoint - POST /auth/register
pub async fn register(
    State(state): State<AuthState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, AuthApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(%rejection, "Failed to parse register request");
        AuthApiError::InvalidInput
    })?;

    if payload.username.is_empty() || payload.email.is_empty() || payload.password.is_empty() {
        warn!(username = %payload.username, "Missing fields in register request");
        return Err(AuthApiError::MissingFields);
    }

    let password_hash = state
        .credentials
        .hash_password(&payload.password)
        .await
        .map_err(|err| internal("hash password", err))?;

    let user = state
        .users
        .create(NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
        })
        .await
        .map_err(|err| match err {
            UserStoreError::UsernameTaken => {
                warn!("Registration rejected: username taken");
                AuthApiError::RegistrationFailed
            }
            other => internal("register user", other),
        })?;

    info!(user_id = user.id, "📝 User registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": "User registered" })),
    )
        .into_response())
}

/// Login endpoint - POST /auth/login
pub async fn login(
    State(state): State<AuthState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AuthApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(%rejection, "Failed to parse login request");
        AuthApiError::InvalidInput
    })?;

    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(AuthApiError::InvalidInput);
    }

    info!("🔐 Login attempt: {}", payload.username);

    let pair = state
        .sessions
        .login(&payload.username, &payload.password)
        .await
        .map_err(|err| {
            if err.is_internal() {
                return internal("log in", err);
            }
            warn!(username = %payload.username, "❌ Failed login attempt");
            AuthApiError::InvalidCredentials
        })?;

    Ok(state.token_response(pair))
}

/// Refresh endpoint - POST /auth/refresh-token
pub async fn refresh_token(
    State(state): State<AuthState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Response, AuthApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(%rejection, "Failed to parse refresh token request");
        AuthApiError::InvalidInput
    })?;

    if payload.refresh_token.is_empty() {
        warn!("Missing refresh token in request");
        return Err(AuthApiError::MissingRefreshToken);
    }

    let pair = state
        .sessions
        .refresh(&payload.refresh_token)
        .await
        .map_err(refresh_error)?;

    Ok(state.token_response(pair))
}

/// Every client-side refresh failure looks the same from outside.
fn refresh_error(err: AuthError) -> AuthApiError {
    if err.is_internal() {
        return internal("refresh token", err);
    }
    warn!(reason = %err, "Refresh token rejected");
    AuthApiError::InvalidRefreshToken
}

/// Current user endpoint - GET /api/me
pub async fn get_current_user(
    State(state): State<AuthState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, AuthApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(|err| internal("load user", err))?
        .ok_or(AuthApiError::UserNotFound)?;

    Ok(Json(UserResponse::from_user(&user)))
}

/// Password change endpoint - PUT /api/me/password
///
/// Also ends the user's session, so other devices must log in again once
/// their access token runs out.
pub async fn update_password(
    State(state): State<AuthState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AuthApiError> {
    let Json(payload) = payload.map_err(|_| AuthApiError::InvalidInput)?;

    if payload.password.is_empty() {
        return Err(AuthApiError::MissingFields);
    }

    let password_hash = state
        .credentials
        .hash_password(&payload.password)
        .await
        .map_err(|err| internal("hash password", err))?;

    state
        .users
        .update_password(user_id, &password_hash)
        .await
        .map_err(|err| match err {
            UserStoreError::NotFound => AuthApiError::UserNotFound,
            other => internal("update password", other),
        })?;

    state
        .sessions
        .logout(user_id)
        .await
        .map_err(|err| internal("revoke session", err))?;

    Ok(Json(json!({ "success": "User password has been updated" })))
}

/// Logout endpoint - POST /api/logout
pub async fn logout(
    State(state): State<AuthState>,
    AuthUser(user_id): AuthUser,
) -> Result<Response, AuthApiError> {
    state
        .sessions
        .logout(user_id)
        .await
        .map_err(|err| internal("log out", err))?;

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, state.cookies.cleared_cookie())],
    )
        .into_response())
}

fn internal(action: &str, err: impl std::fmt::Display) -> AuthApiError {
    error!("Failed to {action}: {err:#}");
    AuthApiError::InternalError
}

/// API error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthApiError {
    InvalidInput,
    MissingFields,
    MissingRefreshToken,
    InvalidCredentials,
    InvalidRefreshToken,
    RegistrationFailed,
    UserNotFound,
    InternalError,
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidInput => (StatusCode::BAD_REQUEST, "Invalid input"),
            AuthApiError::MissingFields => (StatusCode::BAD_REQUEST, "Missing fields"),
            AuthApiError::MissingRefreshToken => {
                (StatusCode::BAD_REQUEST, "Missing refresh token")
            }
            AuthApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            AuthApiError::InvalidRefreshToken => {
                (StatusCode::UNAUTHORIZED, "Invalid refresh token")
            }
            AuthApiError::RegistrationFailed => (StatusCode::BAD_REQUEST, "Could not register"),
            AuthApiError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            AuthApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
