//! Authentication Module
//! Mission: Password login, RS256 session tokens and refresh-token rotation

pub mod api;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod keys;
pub mod middleware;
pub mod models;
pub mod session;
pub mod token_store;
pub mod user_store;

pub use api::{AuthState, CookieSettings};
pub use credentials::CredentialVerifier;
pub use error::{AuthError, KeyMaterialError, TokenError};
pub use jwt::TokenCodec;
pub use keys::SigningKeys;
pub use middleware::{auth_middleware, AuthUser, TokenVerifier};
pub use session::SessionService;
pub use token_store::{MemoryRefreshTokenStore, RefreshTokenStore, SqliteRefreshTokenStore};
pub use user_store::{SqliteUserStore, UserStore};
