/// Account Routes
///
/// Signup, login and the protected account listing.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, Claims, SessionManager};
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::security::RateLimiter;
use crate::store::{Account, NewAccount};
use crate::validators::{is_valid_email, is_valid_name, require};

/// Signup request; fields are optional so a missing one is a validation error
#[derive(Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Public view of an account
#[derive(Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<Account> for UserSummary {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub message: &'static str,
    pub user: UserSummary,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Passwords are taken verbatim, never trimmed
fn require_password(password: Option<&str>) -> Result<&str, ValidationError> {
    password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ValidationError::EmptyField("password".to_string()))
}

/// POST /users/signup
///
/// Create an account and open its first session.
///
/// # Errors
/// - 400: Missing or invalid name, email or password
/// - 409: Email already registered
/// - 429: Rate limited
pub async fn signup(
    req: HttpRequest,
    form: web::Json<SignupRequest>,
    sessions: web::Data<SessionManager>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("signup");
    limiter.check_request(&req)?;

    let name = is_valid_name(require(form.name.as_deref(), "name")?)?;
    let email = is_valid_email(require(form.email.as_deref(), "email")?)?;
    let password_hash = hash_password(require_password(form.password.as_deref())?)?;

    let account = sessions
        .store()
        .create_account(NewAccount {
            name,
            email,
            password_hash,
        })
        .await?;

    let pair = sessions.start_session(account.id, &account.email).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %account.id,
        "Account created"
    );

    Ok(HttpResponse::Created().json(SignupResponse {
        message: "Signup successful",
        user: account.into(),
        token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// GET /users/signup
pub async fn signup_info() -> HttpResponse {
    HttpResponse::Ok().json(MessageResponse {
        message: "Send a POST request with name, email and password to sign up",
    })
}

/// POST /users/login
///
/// Check credentials and open a new session. Any earlier refresh token of
/// the account stops working.
///
/// # Errors
/// - 400: Missing email or password
/// - 401: Unknown email or wrong password (indistinguishable)
/// - 429: Rate limited
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("login");
    limiter.check_request(&req)?;

    let email = require(form.email.as_deref(), "email")?;
    let password = require_password(form.password.as_deref())?;

    let account = match sessions.store().get_account_by_email(email).await? {
        Some(account) => account,
        None => {
            tracing::warn!(request_id = %context.request_id, "Login for unknown email");
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    if !verify_password(password, &account.password_hash)? {
        tracing::warn!(
            request_id = %context.request_id,
            user_id = %account.id,
            "Login with wrong password"
        );
        return Err(AuthError::InvalidCredentials.into());
    }

    let pair = sessions.start_session(account.id, &account.email).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %account.id,
        "User logged in"
    );

    Ok(HttpResponse::Ok().json(LoginResponse {
        message: "Login successful",
        token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// GET /users
///
/// Requires a valid access token (enforced by `AuthGate`).
pub async fn list_users(
    claims: web::ReqData<Claims>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("list_users").with_user_id(claims.sub.clone());

    let users: Vec<UserSummary> = sessions
        .store()
        .list_accounts()
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?
        .into_iter()
        .map(UserSummary::from)
        .collect();

    Ok(HttpResponse::Ok().json(users))
}
