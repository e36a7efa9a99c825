//! Client for the Telegram Bot API, used to establish that a candidate
//! token is valid and belongs to a bot account.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::error::{AppError, TelegramError};

/// Bot identity returned by `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotInfo {
    pub id: i64,
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl BotInfo {
    pub fn display_name(&self) -> String {
        self.first_name
            .clone()
            .unwrap_or_else(|| "Unknown Bot".to_string())
    }

    pub fn username_or_empty(&self) -> String {
        self.username.clone().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct GetMeResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<BotInfo>,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    base_url: String,
}

impl TelegramClient {
    /// The timeout bounds every call; a hung upstream surfaces as
    /// `TelegramError::Timeout`, never as an indefinite wait.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Calls `getMe` with the candidate token. Returns the bot identity, or
    /// a distinct error for timeout, connection failure, rejection, and
    /// non-bot accounts. Never retried here; the caller decides.
    pub async fn validate_bot_token(&self, token: &str) -> Result<BotInfo, AppError> {
        // The token is part of the URL; neither may be logged.
        let url = format!("{}/bot{}/getMe", self.base_url, token);

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                TelegramError::Timeout
            } else if e.is_connect() {
                TelegramError::Connection
            } else {
                TelegramError::Api(format!("request failed: {}", e))
            }
        })?;

        match response.status() {
            StatusCode::OK => {
                let body: GetMeResponse = response
                    .json()
                    .await
                    .map_err(|e| TelegramError::Api(format!("invalid response body: {}", e)))?;

                if !body.ok {
                    let description = body
                        .description
                        .unwrap_or_else(|| "unknown error".to_string());
                    warn!("Telegram rejected token: {}", description);
                    return Err(TelegramError::Rejected(description).into());
                }

                let info = body
                    .result
                    .ok_or_else(|| TelegramError::Api("missing result field".to_string()))?;

                if !info.is_bot {
                    warn!(bot_id = info.id, "token belongs to a non-bot account");
                    return Err(TelegramError::NotABot.into());
                }

                Ok(info)
            }
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => {
                Err(TelegramError::Rejected("invalid bot token".to_string()).into())
            }
            status => Err(TelegramError::Api(format!(
                "Telegram API returned status {}",
                status
            ))
            .into()),
        }
    }
}
