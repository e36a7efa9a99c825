use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One registered bot account. The bot token is present only in sealed
/// form; `Account` itself is never serialized into responses — use
/// [`AccountSummary`] or [`AccountDetail`].
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: i64,
    pub bot_token_sealed: String,
    pub bot_id: i64,
    pub bot_username: String,
    pub bot_name: String,
    pub channel_id: i64,
    pub channel_username: String,
    pub channel_title: String,
    pub channel_member_count: i32,
    pub can_post_messages: bool,
    pub can_edit_messages: bool,
    pub can_send_media: bool,
    pub is_active: bool,
    pub bot_verified: bool,
    pub channel_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_bot_check_at: DateTime<Utc>,
}

/// Insert payload for a new account; everything else takes its schema
/// default (channel setup pending, active, bot verified).
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub bot_id: i64,
    pub bot_username: String,
    pub bot_name: String,
    pub bot_token_sealed: String,
}

/// Public projection returned to first-party clients.
#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub id: i64,
    pub bot_username: String,
    pub bot_name: String,
    pub channel_username: String,
    pub channel_title: String,
    pub channel_member_count: i32,
    pub channel_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Full projection (minus the sealed token) for sibling services.
#[derive(Debug, Serialize)]
pub struct AccountDetail {
    pub id: i64,
    pub bot_id: i64,
    pub bot_username: String,
    pub bot_name: String,
    pub channel_id: i64,
    pub channel_username: String,
    pub channel_title: String,
    pub channel_member_count: i32,
    pub can_post_messages: bool,
    pub can_edit_messages: bool,
    pub can_send_media: bool,
    pub is_active: bool,
    pub bot_verified: bool,
    pub channel_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_bot_check_at: DateTime<Utc>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            bot_username: account.bot_username.clone(),
            bot_name: account.bot_name.clone(),
            channel_username: account.channel_username.clone(),
            channel_title: account.channel_title.clone(),
            channel_member_count: account.channel_member_count,
            channel_verified: account.channel_verified,
            created_at: account.created_at,
        }
    }
}

impl From<&Account> for AccountDetail {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            bot_id: account.bot_id,
            bot_username: account.bot_username.clone(),
            bot_name: account.bot_name.clone(),
            channel_id: account.channel_id,
            channel_username: account.channel_username.clone(),
            channel_title: account.channel_title.clone(),
            channel_member_count: account.channel_member_count,
            can_post_messages: account.can_post_messages,
            can_edit_messages: account.can_edit_messages,
            can_send_media: account.can_send_media,
            is_active: account.is_active,
            bot_verified: account.bot_verified,
            channel_verified: account.channel_verified,
            created_at: account.created_at,
            last_login_at: account.last_login_at,
            last_bot_check_at: account.last_bot_check_at,
        }
    }
}

/// Ephemeral proof of a successful login. Valid iff active, unexpired, and
/// the owning account is active; invalidation is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuthSession {
    pub id: i64,
    pub session_id: String,
    pub account_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl AuthSession {
    /// `id` is assigned by the store on insert.
    pub fn new(session_id: String, account_id: i64, ttl_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            session_id,
            account_id,
            created_at: now,
            expires_at: now + Duration::hours(ttl_hours),
            is_active: true,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_active && !self.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_is_valid() {
        let session = AuthSession::new("sess_test".to_string(), 1, 24);
        assert!(session.is_active);
        assert!(!session.is_expired());
        assert!(session.is_valid());
    }

    #[test]
    fn test_expired_session_is_invalid() {
        let mut session = AuthSession::new("sess_test".to_string(), 1, 24);
        session.expires_at = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
        assert!(!session.is_valid());
    }

    #[test]
    fn test_invalidated_session_is_invalid_before_expiry() {
        let mut session = AuthSession::new("sess_test".to_string(), 1, 24);
        session.is_active = false;
        assert!(!session.is_expired());
        assert!(!session.is_valid());
    }

    #[test]
    fn test_account_projections_omit_sealed_token() {
        let account = Account {
            id: 7,
            bot_token_sealed: "nonce.ciphertext".to_string(),
            bot_id: 1234567890,
            bot_username: "example_bot".to_string(),
            bot_name: "Example Bot".to_string(),
            channel_id: 0,
            channel_username: String::new(),
            channel_title: "Setup Required".to_string(),
            channel_member_count: 0,
            can_post_messages: false,
            can_edit_messages: false,
            can_send_media: false,
            is_active: true,
            bot_verified: true,
            channel_verified: false,
            created_at: Utc::now(),
            last_login_at: None,
            last_bot_check_at: Utc::now(),
        };

        let summary = serde_json::to_string(&AccountSummary::from(&account)).unwrap();
        let detail = serde_json::to_string(&AccountDetail::from(&account)).unwrap();
        assert!(!summary.contains("ciphertext"));
        assert!(!detail.contains("ciphertext"));
        assert!(detail.contains("\"bot_id\":1234567890"));
    }
}
