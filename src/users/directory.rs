/// User directory implementation using runtime queries
use crate::{
    config::AdminBootstrapConfig,
    error::{ApiError, ApiResult},
    users::{PendingUser, User},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Hash a password with Argon2id and a fresh salt
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2id hash
pub fn verify_password(password: &str, stored_hash: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Persistence for users and pending signups
pub struct UserDirectory {
    db: SqlitePool,
}

impl UserDirectory {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Find a verified user by email (case-normalized)
    pub async fn find_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, name, password_hash, is_admin, is_verified,
                    otp_code, otp_expires_at, reset_token, reset_expires_at,
                    created_at, updated_at
             FROM users WHERE email = ?1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(row.map(|r| Self::user_from_row(&r)))
    }

    /// Find a user by id
    pub async fn find_by_id(&self, id: &str) -> ApiResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, name, password_hash, is_admin, is_verified,
                    otp_code, otp_expires_at, reset_token, reset_expires_at,
                    created_at, updated_at
             FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(row.map(|r| Self::user_from_row(&r)))
    }

    /// Find a pending signup by email
    pub async fn find_pending_by_email(&self, email: &str) -> ApiResult<Option<PendingUser>> {
        let row = sqlx::query(
            "SELECT id, email, name, password_hash, otp_code, otp_expires_at, created_at
             FROM pending_users WHERE email = ?1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(row.map(|r| PendingUser {
            id: r.get("id"),
            email: r.get("email"),
            name: r.get("name"),
            password_hash: r.get("password_hash"),
            otp_code: r.get("otp_code"),
            otp_expires_at: r.get("otp_expires_at"),
            created_at: r.get("created_at"),
        }))
    }

    /// Create or overwrite the pending signup for an email.
    ///
    /// Each signup attempt replaces any earlier pending record so only
    /// the latest code is ever valid.
    pub async fn upsert_pending(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: Option<&str>,
        otp_code: &str,
        otp_expires_at: DateTime<Utc>,
    ) -> ApiResult<PendingUser> {
        let email = email.trim().to_lowercase();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO pending_users (id, email, name, password_hash, otp_code, otp_expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(email) DO UPDATE SET
                 name = excluded.name,
                 password_hash = excluded.password_hash,
                 otp_code = excluded.otp_code,
                 otp_expires_at = excluded.otp_expires_at",
        )
        .bind(&id)
        .bind(&email)
        .bind(name)
        .bind(password_hash)
        .bind(otp_code)
        .bind(otp_expires_at)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        self.find_pending_by_email(&email)
            .await?
            .ok_or_else(|| ApiError::Internal("Pending user upsert lost".to_string()))
    }

    /// Promote a pending signup into a verified user, deleting the
    /// staging record in the same transaction.
    pub async fn promote_pending(&self, pending: &PendingUser) -> ApiResult<User> {
        let mut tx = self.db.begin().await.map_err(ApiError::Database)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, is_admin, is_verified, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, FALSE, TRUE, ?5, ?5)",
        )
        .bind(&id)
        .bind(&pending.email)
        .bind(&pending.name)
        .bind(&pending.password_hash)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::Database)?;

        sqlx::query("DELETE FROM pending_users WHERE id = ?1")
            .bind(&pending.id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::Database)?;

        tx.commit().await.map_err(ApiError::Database)?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| ApiError::Internal("Promoted user not found".to_string()))
    }

    /// Store a fresh one-time code on a user
    pub async fn set_otp(
        &self,
        user_id: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> ApiResult<()> {
        sqlx::query(
            "UPDATE users SET otp_code = ?1, otp_expires_at = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(code)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Consume a user's one-time code: mark verified and clear the code
    pub async fn consume_otp(&self, user_id: &str) -> ApiResult<()> {
        sqlx::query(
            "UPDATE users SET is_verified = TRUE, otp_code = NULL, otp_expires_at = NULL,
                    updated_at = ?1
             WHERE id = ?2",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Store a password reset token on a user
    pub async fn set_reset_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> ApiResult<()> {
        sqlx::query(
            "UPDATE users SET reset_token = ?1, reset_expires_at = ?2, updated_at = ?3
             WHERE id = ?4",
        )
        .bind(token)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Overwrite the password hash and clear any reset token
    pub async fn reset_password(&self, user_id: &str, password_hash: &str) -> ApiResult<()> {
        sqlx::query(
            "UPDATE users SET password_hash = ?1, reset_token = NULL, reset_expires_at = NULL,
                    updated_at = ?2
             WHERE id = ?3",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Idempotently ensure the configured admin account exists.
    ///
    /// Creates a verified admin user on first match, or upgrades an
    /// existing record (admin flag, verified flag, password hash if it
    /// had none). Bootstrap path only; callers must have already
    /// checked the credential pair against configuration.
    pub async fn ensure_admin(&self, bootstrap: &AdminBootstrapConfig) -> ApiResult<User> {
        let email = bootstrap.email.trim().to_lowercase();

        if let Some(existing) = self.find_by_email(&email).await? {
            let needs_hash = existing.password_hash.is_none();
            if !existing.is_admin || !existing.is_verified || needs_hash {
                let hash = if needs_hash {
                    Some(hash_password(&bootstrap.password)?)
                } else {
                    existing.password_hash.clone()
                };

                sqlx::query(
                    "UPDATE users SET is_admin = TRUE, is_verified = TRUE, password_hash = ?1,
                            updated_at = ?2
                     WHERE id = ?3",
                )
                .bind(&hash)
                .bind(Utc::now())
                .bind(&existing.id)
                .execute(&self.db)
                .await
                .map_err(ApiError::Database)?;
            }

            return self
                .find_by_id(&existing.id)
                .await?
                .ok_or_else(|| ApiError::Internal("Admin user vanished".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let hash = hash_password(&bootstrap.password)?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, is_admin, is_verified, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, TRUE, TRUE, ?5, ?5)",
        )
        .bind(&id)
        .bind(&email)
        .bind(&bootstrap.name)
        .bind(&hash)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| ApiError::Internal("Admin user not found after insert".to_string()))
    }

    fn user_from_row(row: &SqliteRow) -> User {
        User {
            id: row.get("id"),
            email: row.get("email"),
            name: row.get("name"),
            password_hash: row.get("password_hash"),
            is_admin: row.get("is_admin"),
            is_verified: row.get("is_verified"),
            otp_code: row.get("otp_code"),
            otp_expires_at: row.get("otp_expires_at"),
            reset_token: row.get("reset_token"),
            reset_expires_at: row.get("reset_expires_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}
