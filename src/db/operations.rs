use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::db::models::{Account, AuthSession, NewAccount};
use crate::db::{AccountStore, SessionStore};
use crate::error::{AppError, DatabaseError};

const ACCOUNT_COLUMNS: &str = "id, bot_token_sealed, bot_id, bot_username, bot_name, \
     channel_id, channel_username, channel_title, channel_member_count, \
     can_post_messages, can_edit_messages, can_send_media, \
     is_active, bot_verified, channel_verified, \
     created_at, last_login_at, last_bot_check_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(|e| {
                AppError::Database(DatabaseError::ConnectionError(e.to_string()))
            })?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::QueryError(e.to_string())))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn insert_account(&self, new: NewAccount) -> Result<Account, AppError> {
        let query = format!(
            "INSERT INTO accounts (bot_token_sealed, bot_id, bot_username, bot_name) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let account = sqlx::query_as::<_, Account>(&query)
            .bind(&new.bot_token_sealed)
            .bind(new.bot_id)
            .bind(&new.bot_username)
            .bind(&new.bot_name)
            .fetch_one(&self.pool)
            .await?;

        Ok(account)
    }

    async fn account_by_id(&self, id: i64) -> Result<Option<Account>, AppError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");

        let account = sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    async fn account_by_bot_id(&self, bot_id: i64) -> Result<Option<Account>, AppError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE bot_id = $1");

        let account = sqlx::query_as::<_, Account>(&query)
            .bind(bot_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    async fn touch_last_login(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET last_login_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_bot_profile(
        &self,
        id: i64,
        bot_username: &str,
        bot_name: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE accounts \
             SET bot_username = $1, bot_name = $2, bot_verified = TRUE, last_bot_check_at = $3 \
             WHERE id = $4",
        )
        .bind(bot_username)
        .bind(bot_name)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn touch_bot_check(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET last_bot_check_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(&self, session: &AuthSession) -> Result<AuthSession, AppError> {
        let stored = sqlx::query_as::<_, AuthSession>(
            "INSERT INTO auth_sessions (session_id, account_id, created_at, expires_at, is_active) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, session_id, account_id, created_at, expires_at, is_active",
        )
        .bind(&session.session_id)
        .bind(session.account_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn session_by_id(&self, session_id: &str) -> Result<Option<AuthSession>, AppError> {
        let session = sqlx::query_as::<_, AuthSession>(
            "SELECT id, session_id, account_id, created_at, expires_at, is_active \
             FROM auth_sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn invalidate_session(&self, session_id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE auth_sessions SET is_active = FALSE WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
