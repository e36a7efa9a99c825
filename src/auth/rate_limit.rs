//! Admission control for the authentication surface.
//!
//! Fixed-window counting per (client key, endpoint class). Windows are
//! aligned to the wall clock, so behavior is deterministic for a given
//! timestamp. The counter store is pluggable; the in-process map is enough
//! for a single instance, while multi-instance deployments need a shared
//! backend so limits hold service-wide.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Register,
    Login,
    VerifySession,
    DecryptToken,
    General,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Register => "register",
            EndpointClass::Login => "login",
            EndpointClass::VerifySession => "verify_session",
            EndpointClass::DecryptToken => "decrypt_token",
            EndpointClass::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClassBudget {
    pub limit: u64,
    pub window_secs: i64,
}

impl ClassBudget {
    pub const fn new(limit: u64, window_secs: i64) -> Self {
        Self { limit, window_secs }
    }

    pub const fn per_minute(limit: u64) -> Self {
        Self::new(limit, 60)
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Direction taken when the counter store is unreachable.
    pub fail_open: bool,
    pub register: ClassBudget,
    pub login: ClassBudget,
    pub verify_session: ClassBudget,
    pub decrypt_token: ClassBudget,
    pub general: ClassBudget,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            fail_open: true,
            register: ClassBudget::per_minute(5),
            login: ClassBudget::per_minute(10),
            verify_session: ClassBudget::per_minute(100),
            decrypt_token: ClassBudget::per_minute(50),
            general: ClassBudget::new(1000, 3600),
        }
    }
}

impl RateLimitConfig {
    fn budget(&self, class: EndpointClass) -> ClassBudget {
        match class {
            EndpointClass::Register => self.register,
            EndpointClass::Login => self.login,
            EndpointClass::VerifySession => self.verify_session,
            EndpointClass::DecryptToken => self.decrypt_token,
            EndpointClass::General => self.general,
        }
    }
}

#[derive(Debug, Error)]
pub enum CounterStoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// Counter backend. `increment` must be atomic: concurrent calls for the
/// same key and window must observe distinct counts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateCounterStore: Send + Sync {
    /// Increments the counter for `key` within the window starting at
    /// `window_start` (unix seconds) and returns the post-increment count.
    /// A new window resets the count to zero before incrementing.
    async fn increment(
        &self,
        key: &str,
        window_start: i64,
        ttl_secs: i64,
    ) -> Result<u64, CounterStoreError>;
}

struct WindowCounter {
    window_start: i64,
    count: u64,
    expires_at: i64,
}

/// In-process counter map. The mutex is the single-writer serialization
/// point: increment-and-read happens under one lock acquisition, so two
/// simultaneous requests at the limit can never both be admitted.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, WindowCounter>>,
}

impl MemoryCounterStore {
    /// Drops counters whose window has fully elapsed. Housekeeping only;
    /// correctness never depends on eviction.
    pub async fn evict_stale(&self) {
        let now = Utc::now().timestamp();
        let mut counters = self.counters.lock().await;
        counters.retain(|_, counter| counter.expires_at > now);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.counters.lock().await.len()
    }
}

#[async_trait]
impl RateCounterStore for MemoryCounterStore {
    async fn increment(
        &self,
        key: &str,
        window_start: i64,
        ttl_secs: i64,
    ) -> Result<u64, CounterStoreError> {
        let mut counters = self.counters.lock().await;
        let counter = counters
            .entry(key.to_string())
            .or_insert_with(|| WindowCounter {
                window_start,
                count: 0,
                expires_at: window_start + ttl_secs,
            });

        if counter.window_start != window_start {
            // A new window replaces the old one; counts never carry over.
            counter.window_start = window_start;
            counter.count = 0;
            counter.expires_at = window_start + ttl_secs;
        }

        counter.count += 1;
        Ok(counter.count)
    }
}

pub struct RateGovernor {
    store: Arc<dyn RateCounterStore>,
    config: RateLimitConfig,
}

impl RateGovernor {
    pub fn new(store: Arc<dyn RateCounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Admission check. Denial carries the seconds until the window resets.
    pub async fn admit(&self, client_key: &str, class: EndpointClass) -> Result<(), AppError> {
        self.admit_at(client_key, class, Utc::now()).await
    }

    /// Same as [`admit`](Self::admit) with an explicit timestamp; window
    /// boundaries depend only on `now`, which keeps tests deterministic.
    pub async fn admit_at(
        &self,
        client_key: &str,
        class: EndpointClass,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let budget = self.config.budget(class);
        let now_secs = now.timestamp();
        let window_start = now_secs - now_secs.rem_euclid(budget.window_secs);
        let key = format!("{}:{}", class.as_str(), client_key);

        match self
            .store
            .increment(&key, window_start, budget.window_secs)
            .await
        {
            Ok(count) if count <= budget.limit => Ok(()),
            Ok(_) => {
                let retry_after_secs =
                    (window_start + budget.window_secs - now_secs).max(1) as u64;
                warn!(
                    class = class.as_str(),
                    "admission denied, window resets in {}s", retry_after_secs
                );
                Err(AppError::RateLimited { retry_after_secs })
            }
            Err(e) if self.config.fail_open => {
                warn!("counter store unreachable, admitting (fail-open): {}", e);
                Ok(())
            }
            Err(e) => {
                warn!("counter store unreachable, denying (fail-closed): {}", e);
                Err(AppError::RateLimited {
                    retry_after_secs: budget.window_secs as u64,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn governor(config: RateLimitConfig) -> RateGovernor {
        RateGovernor::new(Arc::new(MemoryCounterStore::default()), config)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_sixth_request_in_window_is_denied() {
        let governor = governor(RateLimitConfig::default());
        let now = at(1_700_000_010);

        for _ in 0..5 {
            governor
                .admit_at("10.0.0.1", EndpointClass::Register, now)
                .await
                .unwrap();
        }

        let denied = governor
            .admit_at("10.0.0.1", EndpointClass::Register, now)
            .await
            .unwrap_err();
        match denied {
            AppError::RateLimited { retry_after_secs } => {
                assert!(retry_after_secs > 0);
                assert!(retry_after_secs <= 60);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_window_elapse_resets_count() {
        let governor = governor(RateLimitConfig::default());
        let now = at(1_700_000_010);

        for _ in 0..6 {
            let _ = governor
                .admit_at("10.0.0.1", EndpointClass::Register, now)
                .await;
        }

        // Next wall-aligned window
        let later = at(1_700_000_070);
        governor
            .admit_at("10.0.0.1", EndpointClass::Register, later)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_keys_and_classes_are_independent() {
        let governor = governor(RateLimitConfig::default());
        let now = at(1_700_000_010);

        for _ in 0..5 {
            governor
                .admit_at("10.0.0.1", EndpointClass::Register, now)
                .await
                .unwrap();
        }

        // Other clients and other classes still have budget
        governor
            .admit_at("10.0.0.2", EndpointClass::Register, now)
            .await
            .unwrap();
        governor
            .admit_at("10.0.0.1", EndpointClass::Login, now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_admissions_admit_exactly_limit() {
        let governor = Arc::new(governor(RateLimitConfig::default()));
        let now = at(1_700_000_010);
        let total = 40usize;

        let mut handles = Vec::with_capacity(total);
        for _ in 0..total {
            let governor = governor.clone();
            handles.push(tokio::spawn(async move {
                governor
                    .admit_at("10.0.0.9", EndpointClass::Register, now)
                    .await
                    .is_ok()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 5, "exactly the limit must be admitted, no race overshoot");
    }

    #[tokio::test]
    async fn test_fail_open_admits_on_store_error() {
        let mut store = MockRateCounterStore::new();
        store
            .expect_increment()
            .returning(|_, _, _| Err(CounterStoreError::Unavailable("down".to_string())));

        let governor = RateGovernor::new(
            Arc::new(store),
            RateLimitConfig {
                fail_open: true,
                ..Default::default()
            },
        );

        governor
            .admit("10.0.0.1", EndpointClass::Login)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fail_closed_denies_on_store_error() {
        let mut store = MockRateCounterStore::new();
        store
            .expect_increment()
            .returning(|_, _, _| Err(CounterStoreError::Unavailable("down".to_string())));

        let governor = RateGovernor::new(
            Arc::new(store),
            RateLimitConfig {
                fail_open: false,
                ..Default::default()
            },
        );

        let denied = governor
            .admit("10.0.0.1", EndpointClass::Login)
            .await
            .unwrap_err();
        assert!(matches!(denied, AppError::RateLimited { retry_after_secs } if retry_after_secs > 0));
    }

    #[tokio::test]
    async fn test_evict_stale_drops_elapsed_windows() {
        let store = MemoryCounterStore::default();
        let past_window = Utc::now().timestamp() - 7200;
        store.increment("login:old", past_window, 60).await.unwrap();
        store
            .increment("login:fresh", Utc::now().timestamp(), 3600)
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);

        store.evict_stale().await;
        assert_eq!(store.len().await, 1);
    }
}
