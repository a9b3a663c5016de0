/// Session Routes
///
/// Refresh-token rotation and logout. Both take the refresh token in the
/// JSON body as `{ "token": ... }`.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::SessionManager;
use crate::error::AppError;
use crate::security::RateLimiter;
use crate::validators::{is_valid_token, require};

#[derive(Deserialize)]
pub struct TokenRequest {
    pub token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// POST /token
///
/// Exchange a refresh token for a new access/refresh pair. The presented
/// token is consumed.
///
/// # Errors
/// - 400: Missing token
/// - 401: Invalid, expired, superseded or revoked refresh token
/// - 429: Rate limited
pub async fn refresh_token(
    req: HttpRequest,
    form: web::Json<TokenRequest>,
    sessions: web::Data<SessionManager>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    limiter.check_request(&req)?;

    let token = is_valid_token(require(form.token.as_deref(), "token")?)?;
    let pair = sessions.rotate(token).await?;

    Ok(HttpResponse::Ok().json(RefreshResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// POST /logout
///
/// Revoke the session a refresh token belongs to. Answers the same way
/// whether or not anything was revoked.
///
/// # Errors
/// - 400: Missing token
pub async fn logout(
    form: web::Json<TokenRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let token = require(form.token.as_deref(), "token")?;

    // An oversized token can't match anything stored; nothing to revoke
    match is_valid_token(token) {
        Ok(token) => sessions.end_session(token).await,
        Err(e) => tracing::debug!(error = %e, "Logout with oversized token ignored"),
    }

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Logged out",
    }))
}
