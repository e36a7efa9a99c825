//! Persistence layer: account and session rows plus the store traits the
//! core depends on. The production implementation is Postgres via sqlx;
//! tests substitute in-memory stores.

pub mod models;
pub mod operations;

pub use models::{Account, AccountDetail, AccountSummary, AuthSession, NewAccount};
pub use operations::PgStore;

use async_trait::async_trait;

use crate::error::AppError;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts a new account; a bot-id collision surfaces as
    /// `DatabaseError::Duplicate`.
    async fn insert_account(&self, new: NewAccount) -> Result<Account, AppError>;

    async fn account_by_id(&self, id: i64) -> Result<Option<Account>, AppError>;

    async fn account_by_bot_id(&self, bot_id: i64) -> Result<Option<Account>, AppError>;

    /// Single-row update of the last-login timestamp.
    async fn touch_last_login(&self, id: i64) -> Result<(), AppError>;

    /// Opportunistic refresh of the bot profile snapshot; also records the
    /// verification time.
    async fn update_bot_profile(
        &self,
        id: i64,
        bot_username: &str,
        bot_name: &str,
    ) -> Result<(), AppError>;

    async fn touch_bot_check(&self, id: i64) -> Result<(), AppError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a session row; a session-id collision surfaces as
    /// `DatabaseError::Duplicate`, never as an overwrite.
    async fn insert_session(&self, session: &AuthSession) -> Result<AuthSession, AppError>;

    async fn session_by_id(&self, session_id: &str) -> Result<Option<AuthSession>, AppError>;

    /// Marks the session inactive. Unknown or already-inactive sessions are
    /// not an error.
    async fn invalidate_session(&self, session_id: &str) -> Result<(), AppError>;

    /// Deletes rows past expiry; returns how many were removed.
    async fn delete_expired(&self) -> Result<u64, AppError>;
}
