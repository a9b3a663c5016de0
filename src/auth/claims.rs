/// JWT Claims structure
///
/// The identity claim set shared by access and refresh tokens, plus the
/// registered claims (RFC 7519) needed for expiry and issuer checks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::codec::TokenError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (account ID as UUID string)
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
    /// Unique token ID; keeps two tokens minted in the same second distinct
    pub jti: String,
}

impl Claims {
    /// Create claims for an account, expiring `expiry_seconds` from now
    pub fn new(account_id: Uuid, email: String, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: account_id.to_string(),
            email,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract the account ID from the subject claim
    pub fn account_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed("subject is not a UUID".to_string()))
    }
}
