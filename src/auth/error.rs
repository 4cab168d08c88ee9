//! Authentication error taxonomy

use thiserror::Error;

/// Failures of the token codec
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is malformed")]
    Malformed,

    #[error("token has no subject")]
    MissingSubject,

    #[error("token subject is not a valid user id")]
    InvalidSubject,

    #[error("failed to sign token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Startup-fatal: the signing keypair could not be loaded
#[derive(Debug, Error)]
pub enum KeyMaterialError {
    #[error("{0} not set")]
    PathNotSet(&'static str),

    #[error("could not read {kind} key at {path}: {source}")]
    Unreadable {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {kind} key: {source}")]
    Invalid {
        kind: &'static str,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    #[error("private and public key do not form a pair")]
    Mismatch,
}

/// Failures of the session flows (login, refresh, logout)
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token")]
    InvalidToken,

    #[error("wrong token type")]
    WrongTokenType,

    #[error("invalid token subject")]
    InvalidSubject,

    #[error("no session for user")]
    NoSession,

    #[error("refresh token does not match the active session")]
    TokenMismatch,

    #[error("token issuance failed: {0}")]
    Token(#[source] TokenError),

    #[error("store failure: {0:#}")]
    StoreFailure(#[from] anyhow::Error),
}

impl AuthError {
    /// Server-side faults worth logging with detail; everything else is the caller's.
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::Token(_) | AuthError::StoreFailure(_))
    }
}
