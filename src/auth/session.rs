//! Session lifecycle: issuance, verification, invalidation.
//!
//! Sessions are opaque identifiers backed by store rows with an explicit
//! expiry timestamp. Expiry is detected lazily at verification time; there
//! is no sliding extension, so the TTL set at creation is final.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::{Account, AccountStore, AuthSession, SessionStore};
use crate::error::{AppError, DatabaseError, SessionError};
use crate::token;

/// `sess_` plus 43 URL-safe characters encoding 256 bits of randomness.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("sess_{}", URL_SAFE_NO_PAD.encode(bytes))
}

#[derive(Clone)]
pub struct SessionManager {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    ttl_hours: i64,
}

impl SessionManager {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
        ttl_hours: i64,
    ) -> Self {
        Self {
            accounts,
            sessions,
            ttl_hours,
        }
    }

    /// Issues a fresh session for the account. A store-level identifier
    /// collision is astronomically unlikely but surfaces as an error
    /// rather than an overwrite.
    pub async fn create_session(&self, account_id: i64) -> Result<AuthSession, AppError> {
        let session = AuthSession::new(generate_session_id(), account_id, self.ttl_hours);

        let stored = self.sessions.insert_session(&session).await.map_err(|e| {
            if matches!(e, AppError::Database(DatabaseError::Duplicate)) {
                error!(account_id, "session identifier collision on insert");
                AppError::Internal("session identifier collision".to_string())
            } else {
                e
            }
        })?;

        info!(account_id, "session created");
        Ok(stored)
    }

    /// Read-only verification. Distinguishes an absent token, an unknown/
    /// expired/invalidated session, and a deactivated owning account. Never
    /// mutates session state.
    pub async fn verify_session(&self, raw: &str) -> Result<(Account, AuthSession), AppError> {
        if raw.trim().is_empty() {
            return Err(SessionError::NoSession.into());
        }

        let session_id = match token::validate_session_id_shape(raw) {
            Ok(session_id) => session_id,
            Err(_) => {
                warn!("session verification with malformed identifier");
                return Err(SessionError::Invalid.into());
            }
        };

        let session = self
            .sessions
            .session_by_id(session_id)
            .await?
            .ok_or(AppError::Session(SessionError::Invalid))?;

        if !session.is_valid() {
            return Err(SessionError::Invalid.into());
        }

        let account = self
            .accounts
            .account_by_id(session.account_id)
            .await?
            .ok_or(AppError::Session(SessionError::Invalid))?;

        if !account.is_active {
            warn!(
                account_id = account.id,
                "session verification for deactivated account"
            );
            return Err(AppError::AccountInactive);
        }

        Ok((account, session))
    }

    /// Best-effort, idempotent invalidation. Unknown tokens and store
    /// failures are swallowed: a client retrying logout must always get an
    /// acknowledgment.
    pub async fn invalidate_session(&self, raw: &str) {
        let session_id = raw.trim();
        if session_id.is_empty() {
            return;
        }

        if let Err(e) = self.sessions.invalidate_session(session_id).await {
            warn!("session invalidation failed, ignoring: {}", e);
        } else {
            info!("session invalidated");
        }
    }

    /// Removes expired rows. Storage reclamation only; verification is
    /// already correct without it.
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        self.sessions.delete_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_have_expected_shape() {
        let pattern = Regex::new(r"^sess_[A-Za-z0-9_-]{43}$").unwrap();
        for _ in 0..32 {
            assert!(pattern.is_match(&generate_session_id()));
        }
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_session_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
