use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, reset_token, reset_expiry, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, reset_token, reset_expiry, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Resolve a pending reset token. The expiry filter lives in the query so
    /// an expired token is indistinguishable from an unknown one.
    pub async fn find_by_reset_token(
        db: &PgPool,
        token: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, reset_token, reset_expiry, created_at
            FROM users
            WHERE reset_token = $1 AND reset_expiry > now()
            "#,
        )
        .bind(token)
        .fetch_optional(db)
        .await
    }

    /// Insert a new user. Duplicate email or username surfaces as a
    /// unique-violation database error; callers map it, they never pre-check.
    pub async fn create(
        db: &PgPool,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, username, password_hash, reset_token, reset_expiry, created_at
            "#,
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .fetch_one(db)
        .await
    }

    /// Overwrite any pending reset token for this email in one statement.
    /// Returns false when no such account exists.
    pub async fn set_reset_token(
        db: &PgPool,
        email: &str,
        token: &str,
        expiry: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users SET reset_token = $2, reset_expiry = $3
            WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(token)
        .bind(expiry)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Swap in the new password hash and clear the reset pair in a single
    /// statement keyed on the unexpired token, so a replayed or concurrently
    /// raced token matches zero rows.
    pub async fn consume_reset_token(
        db: &PgPool,
        token: &str,
        new_hash: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET password_hash = $2, reset_token = NULL, reset_expiry = NULL
            WHERE reset_token = $1 AND reset_expiry > now()
            RETURNING id, email, username, password_hash, reset_token, reset_expiry, created_at
            "#,
        )
        .bind(token)
        .bind(new_hash)
        .fetch_optional(db)
        .await
    }
}
