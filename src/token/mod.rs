//! Syntactic checks for Telegram bot tokens and session identifiers.
//!
//! These run before any rate-limited, network, or storage work so that
//! malformed input is rejected at zero cost.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::AppError;

/// Bot tokens look like `<bot id>:<auth part>`: a positive integer, a colon,
/// then 30-50 characters of `[A-Za-z0-9_-]`.
const AUTH_PART_MIN: usize = 30;
const AUTH_PART_MAX: usize = 50;
const TOKEN_MAX: usize = 80;

static SESSION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sess_[A-Za-z0-9_-]{43}$").expect("session id pattern"));

/// Validates the candidate's shape and returns the trimmed token.
pub fn validate_token_shape(candidate: &str) -> Result<&str, AppError> {
    let token = candidate.trim();

    if token.is_empty() {
        return Err(AppError::validation("MISSING_TOKEN", "Bot token is required"));
    }
    if token.len() > TOKEN_MAX {
        return Err(AppError::validation(
            "INVALID_TOKEN_FORMAT",
            "Bot token is too long",
        ));
    }

    let Some((bot_id, auth_part)) = token.split_once(':') else {
        return Err(AppError::validation(
            "INVALID_TOKEN_FORMAT",
            "Invalid bot token format",
        ));
    };

    if bot_id.is_empty() || !bot_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::validation(
            "INVALID_BOT_ID",
            "Invalid bot ID in token",
        ));
    }
    if bot_id.parse::<i64>().map(|id| id <= 0).unwrap_or(true) {
        return Err(AppError::validation(
            "INVALID_BOT_ID",
            "Bot ID must be positive",
        ));
    }

    if auth_part.len() < AUTH_PART_MIN || auth_part.len() > AUTH_PART_MAX {
        return Err(AppError::validation(
            "INVALID_AUTH_TOKEN",
            "Invalid auth token length",
        ));
    }
    if !auth_part
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(AppError::validation(
            "INVALID_AUTH_TOKEN",
            "Invalid characters in auth token",
        ));
    }

    Ok(token)
}

/// The numeric prefix of a shape-valid token.
pub fn extract_bot_id(token: &str) -> Result<i64, AppError> {
    let token = validate_token_shape(token)?;
    let (bot_id, _) = token
        .split_once(':')
        .ok_or_else(|| AppError::validation("INVALID_TOKEN_FORMAT", "Invalid bot token format"))?;

    bot_id
        .parse::<i64>()
        .map_err(|_| AppError::validation("INVALID_BOT_ID", "Invalid bot ID in token"))
}

/// Session identifiers are `sess_` plus 43 URL-safe base64 characters.
pub fn validate_session_id_shape(candidate: &str) -> Result<&str, AppError> {
    let session_id = candidate.trim();

    if session_id.is_empty() {
        return Err(AppError::validation(
            "MISSING_SESSION_ID",
            "Session ID is required",
        ));
    }
    if !SESSION_ID_RE.is_match(session_id) {
        return Err(AppError::validation(
            "INVALID_SESSION_ID_FORMAT",
            "Invalid session ID format",
        ));
    }

    Ok(session_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "1234567890:AAEhBOweik6ad9r_QXMENQjcrGbqCr4K-pc";

    fn code(result: Result<&str, AppError>) -> &'static str {
        result.unwrap_err().error_code()
    }

    #[test]
    fn test_valid_token_passes() {
        assert_eq!(validate_token_shape(VALID).unwrap(), VALID);
        // Surrounding whitespace is trimmed, not rejected
        let padded = format!("  {} ", VALID);
        assert_eq!(validate_token_shape(&padded).unwrap(), VALID);
    }

    #[test]
    fn test_empty_and_overlong_tokens() {
        assert_eq!(code(validate_token_shape("")), "MISSING_TOKEN");
        assert_eq!(code(validate_token_shape("   ")), "MISSING_TOKEN");

        let overlong = format!("123:{}", "a".repeat(100));
        assert_eq!(code(validate_token_shape(&overlong)), "INVALID_TOKEN_FORMAT");
    }

    #[test]
    fn test_missing_delimiter() {
        assert_eq!(
            code(validate_token_shape("1234567890AAEhBOweik6ad9r_QXMENQjcrGbq")),
            "INVALID_TOKEN_FORMAT"
        );
    }

    #[test]
    fn test_bot_id_segment() {
        assert_eq!(
            code(validate_token_shape("abc:AAEhBOweik6ad9r_QXMENQjcrGbqCr4K-pc")),
            "INVALID_BOT_ID"
        );
        assert_eq!(
            code(validate_token_shape(":AAEhBOweik6ad9r_QXMENQjcrGbqCr4K-pc")),
            "INVALID_BOT_ID"
        );
        assert_eq!(
            code(validate_token_shape("0:AAEhBOweik6ad9r_QXMENQjcrGbqCr4K-pc")),
            "INVALID_BOT_ID"
        );
    }

    #[test]
    fn test_auth_part_bounds() {
        // 29 chars: one short of the minimum
        assert_eq!(
            code(validate_token_shape("123:AAEhBOweik6ad9r_QXMENQjcrGbqC")),
            "INVALID_AUTH_TOKEN"
        );
        // 51 chars: one past the maximum
        let long = format!("123:{}", "A".repeat(51));
        assert_eq!(code(validate_token_shape(&long)), "INVALID_AUTH_TOKEN");
        // Forbidden character
        assert_eq!(
            code(validate_token_shape("123:AAEhBOweik6ad9r_QXMENQjcrGbqCr4K!pc")),
            "INVALID_AUTH_TOKEN"
        );
    }

    #[test]
    fn test_extract_bot_id() {
        assert_eq!(extract_bot_id(VALID).unwrap(), 1234567890);
        assert!(extract_bot_id("not-a-token").is_err());
    }

    #[test]
    fn test_session_id_shape() {
        let valid = format!("sess_{}", "a".repeat(43));
        assert_eq!(validate_session_id_shape(&valid).unwrap(), valid);

        assert_eq!(
            validate_session_id_shape("").unwrap_err().error_code(),
            "MISSING_SESSION_ID"
        );
        assert_eq!(
            validate_session_id_shape("sess_short").unwrap_err().error_code(),
            "INVALID_SESSION_ID_FORMAT"
        );
        let wrong_prefix = format!("sid_{}", "a".repeat(43));
        assert_eq!(
            validate_session_id_shape(&wrong_prefix).unwrap_err().error_code(),
            "INVALID_SESSION_ID_FORMAT"
        );
    }
}
