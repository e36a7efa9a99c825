use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {message}")]
    Validation { message: String, code: &'static str },

    #[error("Telegram API error: {0}")]
    Telegram(#[from] TelegramError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Account with this bot already exists")]
    AccountExists,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Rate limit exceeded, retry in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Caller is not authorized for this operation")]
    Unauthorized,

    #[error("Sealed token failed integrity verification: {0}")]
    Decryption(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("request to Telegram API timed out")]
    Timeout,

    #[error("failed to connect to Telegram API")]
    Connection,

    #[error("token does not belong to a bot")]
    NotABot,

    #[error("bot token rejected: {0}")]
    Rejected(String),

    #[error("Telegram API error: {0}")]
    Api(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no session token provided")]
    NoSession,

    #[error("invalid or expired session")]
    Invalid,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

impl AppError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            code,
        }
    }

    /// Stable machine-readable code carried alongside every error response.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation { code, .. } => code,
            AppError::Telegram(e) => match e {
                TelegramError::Timeout => "TELEGRAM_TIMEOUT",
                TelegramError::Connection => "TELEGRAM_UNREACHABLE",
                TelegramError::NotABot => "NOT_A_BOT",
                TelegramError::Rejected(_) => "INVALID_TOKEN",
                TelegramError::Api(_) => "TELEGRAM_API_ERROR",
            },
            AppError::Session(SessionError::NoSession) => "NO_SESSION",
            AppError::Session(SessionError::Invalid) => "INVALID_SESSION",
            AppError::AccountExists => "ACCOUNT_EXISTS",
            AppError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            AppError::AccountInactive => "ACCOUNT_INACTIVE",
            AppError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::Unauthorized => "SERVICE_AUTH_REQUIRED",
            AppError::Decryption(_)
            | AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for faults whose details must not reach the client.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Decryption(_)
                | AppError::Database(_)
                | AppError::Config(_)
                | AppError::Internal(_)
        )
    }

    /// Message safe to include in a response body.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

// Implement conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

// Implement conversion from sqlx::Error
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::Database(DatabaseError::NotFound),
            // 23505 = unique_violation
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AppError::Database(DatabaseError::Duplicate)
            }
            _ => AppError::Database(DatabaseError::QueryError(err.to_string())),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        if self.is_internal() {
            error!("internal fault surfaced to client: {}", self);
        }

        let status = self.status_code();
        let response = json!({
            "success": false,
            "error": self.public_message(),
            "error_code": self.error_code(),
        });

        let mut builder = HttpResponse::build(status);
        if let AppError::RateLimited { retry_after_secs } = self {
            builder.insert_header(("Retry-After", retry_after_secs.to_string()));
        }
        builder.json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Telegram(e) => match e {
                TelegramError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                TelegramError::Connection | TelegramError::Api(_) => StatusCode::BAD_GATEWAY,
                TelegramError::NotABot | TelegramError::Rejected(_) => StatusCode::UNAUTHORIZED,
            },
            AppError::Session(_) => StatusCode::UNAUTHORIZED,
            AppError::AccountExists => StatusCode::CONFLICT,
            AppError::AccountNotFound => StatusCode::NOT_FOUND,
            AppError::AccountInactive => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unauthorized => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Internal(_)));

        let config_err = config::ConfigError::NotFound(String::from("key not found"));
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::Config(_)));

        let db_err = sqlx::Error::RowNotFound;
        let app_err: AppError = db_err.into();
        assert!(matches!(app_err, AppError::Database(DatabaseError::NotFound)));
    }

    #[test]
    fn test_error_status_codes() {
        let err = AppError::Telegram(TelegramError::Rejected("invalid bot token".into()));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::Telegram(TelegramError::Timeout);
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);

        let err = AppError::AccountExists;
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = AppError::AccountInactive;
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = AppError::RateLimited { retry_after_secs: 30 };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let err = AppError::validation("INVALID_TOKEN_FORMAT", "bad shape");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_stable_error_codes() {
        assert_eq!(AppError::AccountExists.error_code(), "ACCOUNT_EXISTS");
        assert_eq!(
            AppError::Session(SessionError::Invalid).error_code(),
            "INVALID_SESSION"
        );
        assert_eq!(
            AppError::Telegram(TelegramError::NotABot).error_code(),
            "NOT_A_BOT"
        );
        assert_eq!(
            AppError::RateLimited { retry_after_secs: 5 }.error_code(),
            "RATE_LIMIT_EXCEEDED"
        );
    }

    #[test]
    fn test_internal_faults_are_masked() {
        let err = AppError::Decryption("tag mismatch".into());
        assert!(err.is_internal());
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = AppError::AccountNotFound;
        assert!(!err.is_internal());
        assert_eq!(err.public_message(), "Account not found");
    }
}
