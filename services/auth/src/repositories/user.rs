//! Account credentials and password resets

use anyhow::Result;
use campus::session::hash_token;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::info;

/// Fields of a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub school_id: i64,
    pub first_name: String,
    pub last_name: String,
}

/// Login-relevant columns of a user row
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub school_id: i64,
    pub is_active: bool,
    pub is_banned: bool,
    /// Current hash first, then up to two previous ones
    pub history: Vec<String>,
}

impl Credentials {
    pub fn current_hash(&self) -> Option<&str> {
        self.history.first().map(String::as_str)
    }
}

/// Account repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn school_exists(&self, school_id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM schools WHERE id = $1")
            .bind(school_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert an account. Returns `false` when the email is already taken
    /// in that school.
    pub async fn create(&self, account: &NewAccount, password_hash: &str) -> Result<bool> {
        info!(user = %account.email, school = account.school_id, "Creating account");

        let row = sqlx::query(
            r#"
            INSERT INTO users (email, school_id, first_name, last_name, pwd1)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email, school_id) DO NOTHING
            RETURNING email
            "#,
        )
        .bind(&account.email)
        .bind(account.school_id)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    pub async fn find_credentials(&self, email: &str, school_id: i64) -> Result<Option<Credentials>> {
        let row = sqlx::query(
            r#"
            SELECT email, school_id, is_active, is_banned, pwd1, pwd2, pwd3
            FROM users
            WHERE email = $1 AND school_id = $2
            "#,
        )
        .bind(email)
        .bind(school_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let pwd1: String = row.try_get("pwd1")?;
                let pwd2: Option<String> = row.try_get("pwd2")?;
                let pwd3: Option<String> = row.try_get("pwd3")?;
                Ok(Some(Credentials {
                    email: row.try_get("email")?,
                    school_id: row.try_get("school_id")?,
                    is_active: row.try_get("is_active")?,
                    is_banned: row.try_get("is_banned")?,
                    history: std::iter::once(pwd1).chain(pwd2).chain(pwd3).collect(),
                }))
            }
            None => Ok(None),
        }
    }

    /// Store a new password, shifting the previous ones down the history,
    /// and end every session of the user. Returns the number of sessions
    /// removed.
    pub async fn change_password(&self, email: &str, school_id: i64, new_hash: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = rotate(&mut tx, email, school_id, new_hash).await?;
        tx.commit().await?;
        Ok(removed)
    }

    /// Record a reset token for a user. Only its digest is stored.
    pub async fn create_reset(
        &self,
        token: &str,
        email: &str,
        school_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO password_resets (token_hash, user_email, school_id, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(hash_token(token))
        .bind(email)
        .bind(school_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Owner of an unused, unexpired reset token
    pub async fn find_reset(&self, token: &str, now: DateTime<Utc>) -> Result<Option<(String, i64)>> {
        let row = sqlx::query(
            r#"
            SELECT user_email, school_id
            FROM password_resets
            WHERE token_hash = $1 AND NOT used AND expires_at > $2
            "#,
        )
        .bind(hash_token(token))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Ok((row.try_get("user_email")?, row.try_get("school_id")?)))
            .transpose()
    }

    /// Consume a reset token and set the new password in one transaction.
    /// Returns `false` if the token was used concurrently.
    pub async fn complete_reset(
        &self,
        token: &str,
        email: &str,
        school_id: i64,
        new_hash: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            "UPDATE password_resets SET used = TRUE WHERE token_hash = $1 AND NOT used",
        )
        .bind(hash_token(token))
        .execute(&mut *tx)
        .await?;
        if consumed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        rotate(&mut tx, email, school_id, new_hash).await?;
        tx.commit().await?;
        Ok(true)
    }
}

async fn rotate(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    email: &str,
    school_id: i64,
    new_hash: &str,
) -> Result<u64> {
    sqlx::query(
        r#"
        UPDATE users
        SET pwd3 = pwd2, pwd2 = pwd1, pwd1 = $1
        WHERE email = $2 AND school_id = $3
        "#,
    )
    .bind(new_hash)
    .bind(email)
    .bind(school_id)
    .execute(&mut **tx)
    .await?;

    let removed = sqlx::query("DELETE FROM session_mapping WHERE user_email = $1 AND school_id = $2")
        .bind(email)
        .bind(school_id)
        .execute(&mut **tx)
        .await?;

    info!(user = %email, sessions = removed.rows_affected(), "Password rotated");
    Ok(removed.rows_affected())
}
