use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::service::ServiceCaller;
use crate::db::{AccountDetail, AccountSummary};
use crate::error::AppError;
use crate::AppState;

/// Rate-limit key for public endpoints: the peer address.
fn client_ip(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate-limit key for service endpoints: the declared service name, falling
/// back to the peer address for unnamed callers.
fn service_key(req: &HttpRequest) -> String {
    req.headers()
        .get("X-Service-Name")
        .and_then(|h| h.to_str().ok())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| client_ip(req))
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub bot_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub bot_token: String,
}

pub async fn register(
    req: HttpRequest,
    body: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = state
        .auth
        .register(&client_ip(&req), &body.bot_token)
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "account_id": account.id,
        "bot": {
            "id": account.bot_id,
            "username": account.bot_username,
            "name": account.bot_name,
        },
        "requires_channel_setup": !account.channel_verified,
    })))
}

pub async fn login(
    req: HttpRequest,
    body: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (session, account) = state.auth.login(&client_ip(&req), &body.bot_token).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "session_id": session.session_id,
        "expires_at": session.expires_at,
        "account": AccountSummary::from(&account),
    })))
}

/// Verification reports validity in the body rather than through the
/// generic error envelope, so callers can branch on `valid` alone.
pub async fn verify_session(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> HttpResponse {
    let token = bearer_token(&req).unwrap_or_default();

    match state.auth.verify_session(&service_key(&req), &token).await {
        Ok((account, session)) => HttpResponse::Ok().json(json!({
            "valid": true,
            "account_id": account.id,
            "account": AccountSummary::from(&account),
            "session": {
                "created_at": session.created_at,
                "expires_at": session.expires_at,
            },
        })),
        Err(e) => {
            warn!("session verification failed: {}", e);
            HttpResponse::build(actix_web::ResponseError::status_code(&e)).json(json!({
                "valid": false,
                "error": e.public_message(),
                "error_code": e.error_code(),
            }))
        }
    }
}

/// Always acknowledges, including for absent or unknown tokens; retried
/// logouts must never be blocked.
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if let Some(token) = bearer_token(&req) {
        state.auth.logout(&token).await;
    }

    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Logged out successfully",
    }))
}

pub async fn get_account(
    req: HttpRequest,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = state
        .auth
        .get_account(&service_key(&req), path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "account": AccountDetail::from(&account),
    })))
}

pub async fn decrypt_token(
    req: HttpRequest,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let caller = ServiceCaller {
        name: req
            .headers()
            .get("X-Service-Name")
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        token: req
            .headers()
            .get("X-Service-Token")
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    };
    let account_id = path.into_inner();

    let bot_token = state
        .auth
        .get_decrypted_token(&service_key(&req), account_id, &caller)
        .await?;

    info!(account_id, service = %caller.name, "decrypt-token request served");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "bot_token": bot_token,
    })))
}
