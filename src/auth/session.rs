//! Session Service
//! Mission: Login, refresh-token rotation with replay detection, and logout
//!
//! Each user has at most one live refresh token. Login replaces it, a
//! successful refresh consumes it and stores its successor, logout drops it.
//! A token that was rotated out no longer matches the stored value, so
//! presenting it again fails. A second login from another device silently
//! ends the first session.

use crate::auth::{
    credentials::CredentialVerifier,
    error::AuthError,
    jwt::TokenCodec,
    models::{RefreshTokenRecord, TokenKind, TokenPair, UserId},
    token_store::RefreshTokenStore,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SessionService {
    codec: Arc<TokenCodec>,
    credentials: Arc<CredentialVerifier>,
    tokens: Arc<dyn RefreshTokenStore>,
}

impl SessionService {
    pub fn new(
        codec: Arc<TokenCodec>,
        credentials: Arc<CredentialVerifier>,
        tokens: Arc<dyn RefreshTokenStore>,
    ) -> Self {
        Self {
            codec,
            credentials,
            tokens,
        }
    }

    /// Verify credentials and start a fresh session, ending any previous one.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user_id = self
            .credentials
            .verify(username, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.tokens.delete_by_user(user_id).await?;

        let pair = self.issue_and_store(user_id).await?;

        info!(user_id, "✅ Login successful");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair; the presented token is spent.
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .codec
            .verify(presented)
            .map_err(|_| AuthError::InvalidToken)?;

        if claims.typ != TokenKind::Refresh {
            return Err(AuthError::WrongTokenType);
        }

        let user_id =
            TokenCodec::extract_subject(&claims).map_err(|_| AuthError::InvalidSubject)?;

        let stored = self
            .tokens
            .find_by_user(user_id)
            .await?
            .ok_or(AuthError::NoSession)?;

        if stored.token.as_bytes() != presented.as_bytes() {
            warn!(user_id, "Refresh token mismatch, possible replay");
            return Err(AuthError::TokenMismatch);
        }

        // Two requests racing with the same token both pass the comparison
        // above; only one of them can delete the row.
        if !self.tokens.consume(user_id, presented).await? {
            warn!(user_id, "Refresh token consumed concurrently");
            return Err(AuthError::TokenMismatch);
        }

        let pair = self.issue_and_store(user_id).await?;

        info!(user_id, "🔄 Refresh token rotated");
        Ok(pair)
    }

    /// End the user's session. Outstanding access tokens stay valid until expiry.
    pub async fn logout(&self, user_id: UserId) -> Result<(), AuthError> {
        self.tokens.delete_by_user(user_id).await?;

        info!(user_id, "👋 Logged out");
        Ok(())
    }

    async fn issue_and_store(&self, user_id: UserId) -> Result<TokenPair, AuthError> {
        let pair = self.codec.issue_pair(user_id).map_err(AuthError::Token)?;

        let expires_at = TokenCodec::expiry_of(&pair.refresh_token).map_err(AuthError::Token)?;

        self.tokens
            .create(RefreshTokenRecord {
                user_id,
                token: pair.refresh_token.clone(),
                expires_at,
                created_at: Utc::now(),
            })
            .await?;

        Ok(pair)
    }
}
