/// JWT Token Codec
///
/// Issues and verifies signed, expiring tokens. Access and refresh tokens
/// are signed with different keys, so a token of one family never verifies
/// as the other.

use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, ConfigError};

const MIN_SECRET_LENGTH: usize = 32;

/// Selects which key family a token is issued or verified with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Why a token failed verification
///
/// Kept for logging only. At the HTTP boundary every variant collapses
/// into a single unauthorized / invalid-refresh-token outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    InvalidSignature,
    Expired,
    Malformed(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::InvalidSignature => write!(f, "invalid signature"),
            TokenError::Expired => write!(f, "token expired"),
            TokenError::Malformed(reason) => write!(f, "malformed token: {}", reason),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

#[derive(Clone)]
struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl TokenKeys {
    fn from_secret(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }
}

#[derive(Clone)]
pub struct TokenCodec {
    access: TokenKeys,
    refresh: TokenKeys,
    issuer: String,
    validation: Validation,
}

impl TokenCodec {
    /// Build a codec from configuration
    ///
    /// # Errors
    /// Returns error if a secret is missing or too short, or if both token
    /// families would share one secret.
    pub fn new(config: &JwtSettings) -> Result<Self, ConfigError> {
        check_secret("jwt.access_secret", &config.access_secret)?;
        check_secret("jwt.refresh_secret", &config.refresh_secret)?;
        if config.access_secret == config.refresh_secret {
            return Err(ConfigError::InvalidValue(
                "jwt.access_secret and jwt.refresh_secret must differ".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.leeway = 0;

        Ok(Self {
            access: TokenKeys::from_secret(&config.access_secret, config.access_token_expiry),
            refresh: TokenKeys::from_secret(&config.refresh_secret, config.refresh_token_expiry),
            issuer: config.issuer.clone(),
            validation,
        })
    }

    fn keys(&self, kind: TokenKind) -> &TokenKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn issue_access_token(&self, account_id: &Uuid, email: &str) -> Result<String, AppError> {
        self.issue(TokenKind::Access, account_id, email)
    }

    pub fn issue_refresh_token(&self, account_id: &Uuid, email: &str) -> Result<String, AppError> {
        self.issue(TokenKind::Refresh, account_id, email)
    }

    fn issue(&self, kind: TokenKind, account_id: &Uuid, email: &str) -> Result<String, AppError> {
        let keys = self.keys(kind);
        let claims = Claims::new(*account_id, email.to_string(), keys.ttl_seconds, self.issuer.clone());

        encode(&Header::default(), &claims, &keys.encoding)
            .map_err(|e| AppError::Internal(format!("{} token generation failed: {}", kind, e)))
    }

    /// Verify signature, issuer and expiry with the key of `kind`
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }

    /// Read the account ID a token claims to belong to, without verifying it
    ///
    /// Never use the result as proof of identity.
    pub fn claimed_account_id(&self, token: &str) -> Option<Uuid> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &self.refresh.decoding, &validation)
            .ok()
            .and_then(|data| data.claims.account_id().ok())
    }
}

fn check_secret(name: &str, secret: &str) -> Result<(), ConfigError> {
    if secret.trim().is_empty() {
        return Err(ConfigError::MissingRequired(name.to_string()));
    }
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be at least {} bytes",
            name, MIN_SECRET_LENGTH
        )));
    }
    Ok(())
}
