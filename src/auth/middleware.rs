//! Authentication Middleware
//! Mission: Protect API endpoints with access-token validation

use crate::auth::{
    error::TokenError,
    jwt::TokenCodec,
    models::{Claims, TokenKind, UserId},
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::headers::{authorization::Bearer, Authorization, Cookie, HeaderMapExt};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Cookie carrying the access token for browser clients
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// What the gate needs from the token codec
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims, TokenError>;

    fn extract_user_id(&self, claims: &Claims) -> Result<UserId, TokenError>;
}

impl TokenVerifier for TokenCodec {
    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        TokenCodec::verify(self, token)
    }

    fn extract_user_id(&self, claims: &Claims) -> Result<UserId, TokenError> {
        TokenCodec::extract_subject(claims)
    }
}

/// Authenticated user id, inserted by [`auth_middleware`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

/// Auth middleware that validates access tokens
pub async fn auth_middleware(
    State(verifier): State<Arc<dyn TokenVerifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, GateRejection> {
    let token = token_from_headers(req.headers()).ok_or(GateRejection::MissingToken)?;

    let claims = verifier
        .verify(&token)
        .map_err(|_| GateRejection::InvalidToken)?;

    if claims.typ != TokenKind::Access {
        return Err(GateRejection::WrongTokenType);
    }

    if claims.is_expired_at(Utc::now()) {
        return Err(GateRejection::Expired);
    }

    let user_id = verifier
        .extract_user_id(&claims)
        .map_err(|_| GateRejection::InvalidSubject)?;

    req.extensions_mut().insert(AuthUser(user_id));

    Ok(next.run(req).await)
}

/// Bearer header first, then the access token cookie
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }

    // A Bearer header that fails to parse (e.g. an empty token) still decides
    // the outcome; the cookie is only consulted when no such header was sent.
    let sent_bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Bearer ") || value.trim_end() == "Bearer");
    if sent_bearer {
        return None;
    }

    headers
        .typed_get::<Cookie>()
        .and_then(|cookie| cookie.get(ACCESS_TOKEN_COOKIE).map(str::to_string))
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(GateRejection::MissingToken)
    }
}

/// Reasons the gate turns a request away. All of them look the same to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    MissingToken,
    InvalidToken,
    WrongTokenType,
    Expired,
    InvalidSubject,
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        debug!(reason = ?self, "Request rejected by auth gate");

        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::keys::tests::{other_keys, test_keys};
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn whoami(AuthUser(user_id): AuthUser) -> String {
        user_id.to_string()
    }

    fn app(verifier: Arc<dyn TokenVerifier>) -> Router {
        Router::new()
            .route("/api/me", get(whoami))
            .route_layer(middleware::from_fn_with_state(verifier, auth_middleware))
    }

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(test_keys()))
    }

    async fn call(app: Router, req: axum::http::Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn bearer(token: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri("/api/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    /// Verifier that accepts anything and hands back fixed claims
    struct StaticVerifier(Claims);

    impl TokenVerifier for StaticVerifier {
        fn verify(&self, _token: &str) -> Result<Claims, TokenError> {
            Ok(self.0.clone())
        }

        fn extract_user_id(&self, claims: &Claims) -> Result<UserId, TokenError> {
            TokenCodec::extract_subject(claims)
        }
    }

    fn static_claims(typ: TokenKind, sub: Option<&str>) -> Claims {
        Claims {
            sub: sub.map(str::to_string),
            typ,
            exp: Utc::now().timestamp() + 60,
            iat: Utc::now().timestamp(),
            jti: String::new(),
        }
    }

    #[tokio::test]
    async fn test_bearer_token_passes() {
        let codec = codec();
        let token = codec.issue_access_token(7).unwrap();

        let (status, body) = call(app(codec), bearer(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "7");
    }

    #[tokio::test]
    async fn test_cookie_fallback_passes() {
        let codec = codec();
        let token = codec.issue_access_token(3).unwrap();

        let req = axum::http::Request::builder()
            .uri("/api/me")
            .header(header::COOKIE, format!("theme=dark; access_token={token}"))
            .body(Body::empty())
            .unwrap();

        let (status, body) = call(app(codec), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "3");
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let req = axum::http::Request::builder()
            .uri("/api/me")
            .body(Body::empty())
            .unwrap();

        let (status, body) = call(app(codec()), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"Unauthorized"}"#);
    }

    #[tokio::test]
    async fn test_empty_bearer_does_not_fall_back_to_cookie() {
        let codec = codec();
        let token = codec.issue_access_token(3).unwrap();

        let req = axum::http::Request::builder()
            .uri("/api/me")
            .header(header::AUTHORIZATION, "Bearer ")
            .header(header::COOKIE, format!("access_token={token}"))
            .body(Body::empty())
            .unwrap();

        let (status, _) = call(app(codec), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_rejected() {
        let token = codec().issue_access_token(1).unwrap();
        let req = axum::http::Request::builder()
            .uri("/api/me")
            .header(header::AUTHORIZATION, format!("Token {token}"))
            .body(Body::empty())
            .unwrap();

        let (status, _) = call(app(codec()), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_token_rejected() {
        let codec = codec();
        let token = codec.issue_refresh_token(1).unwrap();

        let (status, _) = call(app(codec), bearer(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_foreign_signature_rejected() {
        let forged = TokenCodec::new(other_keys()).issue_access_token(1).unwrap();

        let (status, _) = call(app(codec()), bearer(&forged)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_access_token_lifetime_boundary() {
        let codec = codec();
        let now = Utc::now();

        let fresh = codec
            .issue_at(TokenKind::Access, 1, now - chrono::Duration::minutes(14))
            .unwrap();
        let stale = codec
            .issue_at(TokenKind::Access, 1, now - chrono::Duration::minutes(16))
            .unwrap();

        let (status, _) = call(app(codec.clone()), bearer(&fresh)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(app(codec), bearer(&stale)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_subject_rejected() {
        for sub in [None, Some("abc"), Some("0")] {
            let verifier = Arc::new(StaticVerifier(static_claims(TokenKind::Access, sub)));

            let (status, _) = call(app(verifier), bearer("anything")).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "subject {sub:?}");
        }
    }

    #[tokio::test]
    async fn test_mock_verifier_type_check() {
        let verifier = Arc::new(StaticVerifier(static_claims(TokenKind::Refresh, Some("5"))));
        let (status, _) = call(app(verifier), bearer("anything")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let verifier = Arc::new(StaticVerifier(static_claims(TokenKind::Access, Some("5"))));
        let (status, body) = call(app(verifier), bearer("anything")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "5");
    }

    #[test]
    fn test_rejections_are_indistinguishable() {
        for rejection in [
            GateRejection::MissingToken,
            GateRejection::InvalidToken,
            GateRejection::WrongTokenType,
            GateRejection::Expired,
            GateRejection::InvalidSubject,
        ] {
            assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
        }
    }
}
