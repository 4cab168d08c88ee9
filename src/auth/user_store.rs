//! User Storage
//! Mission: Store and look up user accounts in SQLite

use crate::{
    auth::models::{NewUser, User, UserId},
    db::Db,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("username already taken")]
    UsernameTaken,

    #[error("user not found")]
    NotFound,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// User records consumed by the authentication core
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>>;

    async fn create(&self, user: NewUser) -> Result<User, UserStoreError>;

    async fn update_password(&self, id: UserId, password_hash: &str)
        -> Result<(), UserStoreError>;
}

/// User storage with SQLite backend
pub struct SqliteUserStore {
    conn: Db,
}

impl SqliteUserStore {
    pub fn new(conn: Db) -> Self {
        Self { conn }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
        )
        .optional()
        .context("Failed to look up user by username")
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .context("Failed to look up user by id")
    }

    async fn create(&self, user: NewUser) -> Result<User, UserStoreError> {
        let created_at = Utc::now().to_rfc3339();

        let conn = self.conn.lock();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![user.username],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to check for existing user")?;

        if existing.is_some() {
            return Err(UserStoreError::UsernameTaken);
        }

        conn.execute(
            "INSERT INTO users (username, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user.username, user.email, user.password_hash, created_at],
        )
        .context("Failed to insert user")?;

        let id = UserId::try_from(conn.last_insert_rowid())
            .context("User id exceeds the token subject range")?;

        info!(user_id = id, username = %user.username, "✅ Created user");

        Ok(User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at,
        })
    }

    async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), UserStoreError> {
        let conn = self.conn.lock();
        let rows_affected = conn
            .execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, id],
            )
            .context("Failed to update password")?;

        if rows_affected == 0 {
            return Err(UserStoreError::NotFound);
        }

        info!(user_id = id, "🔐 Password updated");
        Ok(())
    }
}
