//! Refresh Token Storage
//! Mission: Track the single active refresh token of each user

use crate::{
    auth::models::{RefreshTokenRecord, UserId},
    db::Db,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use tracing::debug;

/// Key-indexed refresh token persistence.
///
/// One record per user: `create` replaces whatever the user had before.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(&self, record: RefreshTokenRecord) -> Result<()>;

    /// The user's current record, if any
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<RefreshTokenRecord>>;

    async fn delete_by_token(&self, token: &str) -> Result<()>;

    async fn delete_by_user(&self, user_id: UserId) -> Result<()>;

    /// Atomically delete the user's record if its token equals `token`.
    ///
    /// Returns `false` when nothing matched, e.g. a concurrent rotation won.
    async fn consume(&self, user_id: UserId, token: &str) -> Result<bool>;
}

fn check_token(token: &str) -> Result<()> {
    if token.is_empty() {
        bail!("refresh token must not be empty");
    }
    Ok(())
}

fn check_user(user_id: UserId) -> Result<()> {
    if user_id == 0 {
        bail!("user id must not be zero");
    }
    Ok(())
}

/// SQLite-backed store sharing the application database
pub struct SqliteRefreshTokenStore {
    conn: Db,
}

impl SqliteRefreshTokenStore {
    pub fn new(conn: Db) -> Self {
        Self { conn }
    }

    /// Drop records whose expiry has passed; returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn
            .execute(
                "DELETE FROM refresh_tokens WHERE expires_at <= ?1",
                params![Utc::now().timestamp()],
            )
            .context("Failed to purge expired refresh tokens")?;
        Ok(removed)
    }
}

#[async_trait]
impl RefreshTokenStore for SqliteRefreshTokenStore {
    async fn create(&self, record: RefreshTokenRecord) -> Result<()> {
        check_user(record.user_id)?;
        check_token(&record.token)?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO refresh_tokens (token, user_id, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                token = excluded.token,
                expires_at = excluded.expires_at,
                created_at = excluded.created_at",
            params![
                record.token,
                record.user_id,
                record.expires_at.timestamp(),
                record.created_at.timestamp(),
            ],
        )
        .context("Failed to insert refresh token")?;

        debug!(user_id = record.user_id, "Refresh token stored");
        Ok(())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Option<RefreshTokenRecord>> {
        check_user(user_id)?;

        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT user_id, token, expires_at, created_at FROM refresh_tokens
                 WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, UserId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()
            .context("Failed to look up refresh token")?;

        let Some((user_id, token, expires_at, created_at)) = row else {
            return Ok(None);
        };

        Ok(Some(RefreshTokenRecord {
            user_id,
            token,
            expires_at: Utc
                .timestamp_opt(expires_at, 0)
                .single()
                .context("Stored refresh token expiry out of range")?,
            created_at: Utc
                .timestamp_opt(created_at, 0)
                .single()
                .context("Stored refresh token creation time out of range")?,
        }))
    }

    async fn delete_by_token(&self, token: &str) -> Result<()> {
        check_token(token)?;

        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM refresh_tokens WHERE token = ?1",
            params![token],
        )
        .context("Failed to delete refresh token")?;
        Ok(())
    }

    async fn delete_by_user(&self, user_id: UserId) -> Result<()> {
        check_user(user_id)?;

        let conn = self.conn.lock();
        let removed = conn
            .execute(
                "DELETE FROM refresh_tokens WHERE user_id = ?1",
                params![user_id],
            )
            .context("Failed to delete refresh tokens of user")?;

        debug!(user_id, removed, "Refresh tokens cleared");
        Ok(())
    }

    async fn consume(&self, user_id: UserId, token: &str) -> Result<bool> {
        check_user(user_id)?;
        check_token(token)?;

        let conn = self.conn.lock();
        let removed = conn
            .execute(
                "DELETE FROM refresh_tokens WHERE user_id = ?1 AND token = ?2",
                params![user_id, token],
            )
            .context("Failed to consume refresh token")?;
        Ok(removed > 0)
    }
}

/// In-process store: one slot per user, last write wins.
#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    records: Mutex<HashMap<UserId, RefreshTokenRecord>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(&self, record: RefreshTokenRecord) -> Result<()> {
        check_user(record.user_id)?;
        check_token(&record.token)?;

        self.records.lock().insert(record.user_id, record);
        Ok(())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Option<RefreshTokenRecord>> {
        check_user(user_id)?;
        Ok(self.records.lock().get(&user_id).cloned())
    }

    async fn delete_by_token(&self, token: &str) -> Result<()> {
        check_token(token)?;
        self.records.lock().retain(|_, record| record.token != token);
        Ok(())
    }

    async fn delete_by_user(&self, user_id: UserId) -> Result<()> {
        check_user(user_id)?;
        self.records.lock().remove(&user_id);
        Ok(())
    }

    async fn consume(&self, user_id: UserId, token: &str) -> Result<bool> {
        check_user(user_id)?;
        check_token(token)?;

        let mut records = self.records.lock();
        match records.get(&user_id) {
            Some(record) if record.token == token => {
                records.remove(&user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
