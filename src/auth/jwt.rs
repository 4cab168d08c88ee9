//! JWT Token Codec
//! Mission: Issue and verify RS256 access/refresh tokens

use crate::auth::{
    error::TokenError,
    keys::SigningKeys,
    models::{Claims, TokenKind, TokenPair, UserId},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, Header, Validation};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Token codec over an injected signing keypair
pub struct TokenCodec {
    keys: Arc<SigningKeys>,
}

impl TokenCodec {
    pub fn new(keys: Arc<SigningKeys>) -> Self {
        Self { keys }
    }

    /// Short-lived token accepted by the request gate (15 minutes)
    pub fn issue_access_token(&self, subject: UserId) -> Result<String, TokenError> {
        self.issue_at(TokenKind::Access, subject, Utc::now())
    }

    /// Long-lived token accepted only by the refresh flow (7 days)
    pub fn issue_refresh_token(&self, subject: UserId) -> Result<String, TokenError> {
        self.issue_at(TokenKind::Refresh, subject, Utc::now())
    }

    /// Issue both tokens; a failure of either discards the pair.
    pub fn issue_pair(&self, subject: UserId) -> Result<TokenPair, TokenError> {
        let access_token = self.issue_access_token(subject)?;
        let refresh_token = self.issue_refresh_token(subject)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Issue a token as if the clock read `issued_at`.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        subject: UserId,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires_at = issued_at + kind.ttl();

        let claims = Claims {
            sub: Some(subject.to_string()),
            typ: kind,
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
        };

        debug!(
            user_id = subject,
            kind = kind.as_str(),
            exp = claims.exp,
            "Issuing JWT"
        );

        encode(
            &Header::new(Algorithm::RS256),
            &claims,
            self.keys.encoding_key(),
        )
        .map_err(TokenError::Encoding)
    }

    /// Check signature and claim shape. Expiry is left to the caller.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let decoded = decode::<Claims>(token, self.keys.decoding_key(), &validation)?;
        Ok(decoded.claims)
    }

    /// Parse the subject as a user id
    pub fn extract_subject(claims: &Claims) -> Result<UserId, TokenError> {
        let sub = claims.sub.as_deref().ok_or(TokenError::MissingSubject)?;

        match sub.parse::<UserId>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(TokenError::InvalidSubject),
        }
    }

    /// Read `exp` WITHOUT checking the signature.
    ///
    /// Bookkeeping only (persisting a refresh token's expiry). Never base an
    /// authorization decision on this value.
    pub fn expiry_of(token: &str) -> Result<DateTime<Utc>, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let decoded = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
        Ok(decoded.claims.expires_at())
    }
}
