//! Credential Verification
//! Mission: Check username/password without revealing which half was wrong

use crate::auth::{
    models::{User, UserId},
    user_store::UserStore,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

/// bcrypt-backed password checks and hashing
pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
    cost: u32,
    // Compared against when the username is unknown so both paths pay for one bcrypt run.
    dummy_hash: String,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserStore>, cost: u32) -> Result<Self> {
        let dummy_hash =
            bcrypt::hash("not-a-real-password", cost).context("Failed to hash password")?;

        Ok(Self {
            users,
            cost,
            dummy_hash,
        })
    }

    /// Returns the user id on a match. An unknown username and a wrong
    /// password are both `Ok(None)`.
    pub async fn verify(&self, username: &str, password: &str) -> Result<Option<UserId>> {
        let user = self.users.find_by_username(username).await?;

        let (hash, user_id) = match &user {
            Some(User {
                id, password_hash, ..
            }) => (password_hash.clone(), Some(*id)),
            None => (self.dummy_hash.clone(), None),
        };

        let password = password.to_string();
        let matched = tokio::task::spawn_blocking(move || {
            // A corrupt stored hash counts as a mismatch rather than a server error.
            bcrypt::verify(password, &hash).unwrap_or(false)
        })
        .await
        .context("Password verification task failed")?;

        if user_id.is_none() {
            debug!("Credential check for unknown username");
        }

        Ok(user_id.filter(|_| matched))
    }

    /// Hash a new password with the configured cost
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .context("Password hashing task failed")?
            .context("Failed to hash password")
    }
}
