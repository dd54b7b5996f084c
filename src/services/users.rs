use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::models::{NewUser, RefreshTokenRecord, User};
use crate::services::database::{Database, DatabaseError};

fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        hashed_password: row.get("hashed_password"),
        is_verified: row.get("is_verified"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Repository for accounts
///
/// Emails are stored lower-cased so lookups are case-insensitive.
#[derive(Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new account, assigning its id and creation time
    pub async fn save(&self, new_user: NewUser) -> Result<User, DatabaseError> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: new_user.email.trim().to_lowercase(),
            name: new_user.name,
            hashed_password: new_user.hashed_password,
            is_verified: false,
            created_at: chrono::Utc::now(),
            updated_at: None,
        };

        sqlx::query(
            "INSERT INTO users (id, email, name, hashed_password, is_verified, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.hashed_password)
        .bind(user.is_verified)
        .bind(user.created_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| DatabaseError::from_unique_violation(e, &user.email))?;

        tracing::debug!("Created user {}", user.id);
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query(
            "SELECT id, email, name, hashed_password, is_verified, created_at, updated_at FROM users WHERE email = ?",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query(
            "SELECT id, email, name, hashed_password, is_verified, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Mark an account's email as confirmed
    pub async fn mark_verified(&self, user_id: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE users SET is_verified = TRUE, updated_at = ? WHERE id = ?")
            .bind(chrono::Utc::now())
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }

    pub async fn update_password(&self, user_id: &str, hashed_password: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE users SET hashed_password = ?, updated_at = ? WHERE id = ?")
            .bind(hashed_password)
            .bind(chrono::Utc::now())
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }
}

/// Repository for refresh tokens
#[derive(Clone)]
pub struct TokenRepository {
    db: Database,
}

impl TokenRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save_refresh_token(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (token_hash, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .bind(chrono::Utc::now())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    pub async fn find_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, DatabaseError> {
        let row = sqlx::query(
            "SELECT token_hash, user_id, expires_at, created_at, is_revoked FROM refresh_tokens WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| RefreshTokenRecord {
            token_hash: row.get("token_hash"),
            user_id: row.get("user_id"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
            is_revoked: row.get("is_revoked"),
        }))
    }

    /// Revoke one token, returning whether it was active
    pub async fn revoke(&self, token_hash: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET is_revoked = TRUE WHERE token_hash = ? AND is_revoked = FALSE",
        )
        .bind(token_hash)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke every active token of a user
    pub async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET is_revoked = TRUE WHERE user_id = ? AND is_revoked = FALSE",
        )
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete expired or revoked tokens
    pub async fn purge_stale(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ? OR is_revoked = TRUE")
            .bind(chrono::Utc::now())
            .execute(self.db.pool())
            .await?;

        tracing::info!("Purged {} stale refresh tokens", result.rows_affected());
        Ok(result.rows_affected())
    }
}
