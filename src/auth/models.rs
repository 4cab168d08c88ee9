//! Authentication Models
//! Mission: Define user, token and session data structures

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// User identifier, carried as the decimal `sub` claim of every token
pub type UserId = u32;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub created_at: String,
}

/// Fields required to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// The two kinds of bearer token the codec issues
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenKind {
    #[serde(rename = "access")]
    Access,
    #[serde(rename = "refresh")]
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }

    /// Lifetime of a freshly issued token of this kind
    pub fn ttl(&self) -> chrono::Duration {
        match self {
            TokenKind::Access => chrono::Duration::minutes(15),
            TokenKind::Refresh => chrono::Duration::days(7),
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>, // subject (user id)
    pub typ: TokenKind,
    pub exp: i64, // expiration timestamp (unix seconds)
    #[serde(default)]
    pub iat: i64,
    // Unique per token; two tokens minted in the same second must still differ.
    #[serde(default)]
    pub jti: String,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// A token is expired once `now` reaches its `exp` second.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// Access + refresh token issued together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Persisted refresh token, at most one per user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub user_id: UserId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Refresh request body
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Password change request body
#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub password: String,
}

/// User response (sanitized)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_kind_serialization() {
        let json = serde_json::to_string(&TokenKind::Access).unwrap();
        assert_eq!(json, r#""access""#);

        let kind: TokenKind = serde_json::from_str(r#""refresh""#).unwrap();
        assert_eq!(kind, TokenKind::Refresh);

        assert!(serde_json::from_str::<TokenKind>(r#""session""#).is_err());
    }

    #[test]
    fn test_token_kind_ttls() {
        assert_eq!(TokenKind::Access.ttl(), chrono::Duration::minutes(15));
        assert_eq!(TokenKind::Refresh.ttl(), chrono::Duration::days(7));
    }

    #[test]
    fn test_claims_expiry_boundary() {
        let now = Utc::now();
        let claims = Claims {
            sub: Some("1".to_string()),
            typ: TokenKind::Access,
            exp: now.timestamp() + 60,
            iat: now.timestamp(),
            jti: "test".to_string(),
        };

        assert!(!claims.is_expired_at(now));
        assert!(!claims.is_expired_at(now + chrono::Duration::seconds(59)));
        assert!(claims.is_expired_at(now + chrono::Duration::seconds(60)));
        assert_eq!(claims.expires_at().timestamp(), claims.exp);
    }

    #[test]
    fn test_claims_without_subject_deserialize() {
        let claims: Claims = serde_json::from_str(r#"{"typ":"access","exp":10}"#).unwrap();
        assert!(claims.sub.is_none());
        assert_eq!(claims.iat, 0);
        assert!(claims.jti.is_empty());
    }

    #[test]
    fn test_user_response_hides_password_hash() {
        let user = User {
            id: 7,
            username: "testuser".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "hash123".to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("hash123"));

        let response = UserResponse::from_user(&user);
        assert_eq!(response.id, 7);
        assert_eq!(response.username, "testuser");
    }
}
