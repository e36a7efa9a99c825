use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::rate_limit::{EndpointClass, RateGovernor};
use crate::auth::session::SessionManager;
use crate::crypto::{SealedToken, TokenCipher};
use crate::db::{Account, AccountStore, AuthSession, NewAccount};
use crate::error::{AppError, DatabaseError};
use crate::telegram::TelegramClient;
use crate::token;

/// Identity an internal service presents on sensitive operations.
#[derive(Debug, Clone)]
pub struct ServiceCaller {
    pub name: String,
    pub token: String,
}

/// Orchestrates registration, login, and token release. Sequencing is
/// fixed: shape check, admission check, external validation, then storage
/// and crypto work. Cheap rejections always come first.
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    cipher: TokenCipher,
    telegram: TelegramClient,
    sessions: SessionManager,
    governor: RateGovernor,
    service_token: String,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        cipher: TokenCipher,
        telegram: TelegramClient,
        sessions: SessionManager,
        governor: RateGovernor,
        service_token: String,
    ) -> Self {
        Self {
            accounts,
            cipher,
            telegram,
            sessions,
            governor,
            service_token,
        }
    }

    pub async fn register(&self, client_key: &str, candidate: &str) -> Result<Account, AppError> {
        let bot_token = token::validate_token_shape(candidate)?;
        self.governor
            .admit(client_key, EndpointClass::Register)
            .await?;

        let bot = self.telegram.validate_bot_token(bot_token).await?;

        if self.accounts.account_by_bot_id(bot.id).await?.is_some() {
            warn!(bot_id = bot.id, "registration for already-registered bot");
            return Err(AppError::AccountExists);
        }

        let sealed = self.cipher.seal(bot_token)?;
        let account = self
            .accounts
            .insert_account(NewAccount {
                bot_id: bot.id,
                bot_username: bot.username_or_empty(),
                bot_name: bot.display_name(),
                bot_token_sealed: sealed.encode(),
            })
            .await
            .map_err(|e| {
                // Lost the race against a concurrent registration
                if matches!(e, AppError::Database(DatabaseError::Duplicate)) {
                    AppError::AccountExists
                } else {
                    e
                }
            })?;

        info!(
            account_id = account.id,
            bot_id = bot.id,
            bot_username = %account.bot_username,
            "new bot account registered"
        );
        Ok(account)
    }

    /// Login matches by re-validated bot identity: Telegram is the
    /// authority on whether the presented token is currently valid, and
    /// sealed blobs are non-deterministic so ciphertext comparison would be
    /// meaningless. The profile snapshot is refreshed as a side benefit.
    pub async fn login(
        &self,
        client_key: &str,
        candidate: &str,
    ) -> Result<(AuthSession, Account), AppError> {
        let bot_token = token::validate_token_shape(candidate)?;
        self.governor.admit(client_key, EndpointClass::Login).await?;

        let bot = self.telegram.validate_bot_token(bot_token).await?;

        let mut account = self
            .accounts
            .account_by_bot_id(bot.id)
            .await?
            .ok_or(AppError::AccountNotFound)?;

        if !account.is_active {
            warn!(account_id = account.id, "login for deactivated account");
            return Err(AppError::AccountInactive);
        }

        let bot_username = bot.username_or_empty();
        let bot_name = bot.display_name();
        self.accounts
            .update_bot_profile(account.id, &bot_username, &bot_name)
            .await?;
        account.bot_username = bot_username;
        account.bot_name = bot_name;

        let session = self.sessions.create_session(account.id).await?;
        self.accounts.touch_last_login(account.id).await?;

        info!(account_id = account.id, "login succeeded");
        Ok((session, account))
    }

    pub async fn verify_session(
        &self,
        client_key: &str,
        raw: &str,
    ) -> Result<(Account, AuthSession), AppError> {
        self.governor
            .admit(client_key, EndpointClass::VerifySession)
            .await?;
        self.sessions.verify_session(raw).await
    }

    /// Never fails outwardly; see [`SessionManager::invalidate_session`].
    pub async fn logout(&self, raw: &str) {
        self.sessions.invalidate_session(raw).await;
    }

    pub async fn get_account(&self, client_key: &str, account_id: i64) -> Result<Account, AppError> {
        self.governor
            .admit(client_key, EndpointClass::General)
            .await?;

        self.accounts
            .account_by_id(account_id)
            .await?
            .ok_or(AppError::AccountNotFound)
    }

    /// The single exit point for plaintext bot tokens. Requires an
    /// authorized internal caller and an active account; the access event
    /// is logged, the value never is.
    pub async fn get_decrypted_token(
        &self,
        client_key: &str,
        account_id: i64,
        caller: &ServiceCaller,
    ) -> Result<String, AppError> {
        self.governor
            .admit(client_key, EndpointClass::DecryptToken)
            .await?;
        self.authorize_service(caller)?;

        let account = self
            .accounts
            .account_by_id(account_id)
            .await?
            .ok_or(AppError::AccountNotFound)?;

        if !account.is_active {
            warn!(account_id, "token requested for deactivated account");
            return Err(AppError::AccountInactive);
        }

        let sealed = SealedToken::decode(&account.bot_token_sealed)?;
        let bot_token = self.cipher.open(&sealed).map_err(|e| {
            // Data corruption or key mismatch; alert-worthy, never retried
            error!(account_id, "sealed bot token failed to open: {}", e);
            e
        })?;

        self.accounts.touch_bot_check(account_id).await?;

        info!(
            account_id,
            service = %caller.name,
            "bot token released to internal service"
        );
        Ok(bot_token)
    }

    fn authorize_service(&self, caller: &ServiceCaller) -> Result<(), AppError> {
        if self.service_token.is_empty() {
            warn!("decrypt endpoint called but no service token is configured");
            return Err(AppError::Unauthorized);
        }
        if caller.name.is_empty() || caller.token != self.service_token {
            warn!(service = %caller.name, "service authorization failed");
            return Err(AppError::Unauthorized);
        }
        Ok(())
    }
}
