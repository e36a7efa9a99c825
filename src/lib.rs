pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod telegram;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use actix_web::HttpResponse;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{
    AuthService, EndpointClass, MemoryCounterStore, RateGovernor, RateLimitConfig, SessionManager,
};
pub use crypto::TokenCipher;
pub use db::{Account, AuthSession, PgStore};

use db::{AccountStore, SessionStore};
use telegram::TelegramClient;

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth: Arc<AuthService>,
    pub sessions: SessionManager,
    pub counter_store: Arc<MemoryCounterStore>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let store = Arc::new(
            PgStore::connect(&config.database.url, config.database.max_connections).await?,
        );
        store.run_migrations().await?;

        Self::with_stores(config, store.clone(), store)
    }

    /// Wires the core against any pair of stores; tests substitute
    /// in-memory implementations here.
    pub fn with_stores(
        config: Settings,
        accounts: Arc<dyn AccountStore>,
        session_store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let cipher = TokenCipher::from_secret(&config.auth.encryption_secret)?;
        let telegram = TelegramClient::new(
            config.telegram.api_base.clone(),
            Duration::from_secs(config.telegram.timeout_seconds),
        )?;

        let counter_store = Arc::new(MemoryCounterStore::default());
        let governor = RateGovernor::new(
            counter_store.clone(),
            RateLimitConfig {
                fail_open: config.rate_limit.fail_open,
                ..Default::default()
            },
        );

        let sessions = SessionManager::new(
            accounts.clone(),
            session_store,
            config.auth.session_ttl_hours,
        );

        let auth = Arc::new(AuthService::new(
            accounts,
            cipher,
            telegram,
            sessions.clone(),
            governor,
            config.auth.service_token.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            auth,
            sessions,
            counter_store,
        })
    }
}
