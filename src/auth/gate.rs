/// Auth Gate
///
/// Stateless access-token check for protected operations. Storage is never
/// consulted, so an access token stays usable until it expires even after
/// logout.

use crate::auth::claims::Claims;
use crate::auth::codec::{TokenCodec, TokenKind};
use crate::error::AuthError;

/// Verify a bearer access token and return its claims
///
/// Every failure reason collapses into `AuthError::Unauthorized`; the
/// specific reason is only logged.
pub fn authorize(codec: &TokenCodec, token: &str) -> Result<Claims, AuthError> {
    codec.verify(token, TokenKind::Access).map_err(|reason| {
        tracing::warn!(reason = %reason, "Access token rejected");
        AuthError::Unauthorized
    })
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::codec::tests::test_config;
    use uuid::Uuid;

    #[test]
    fn test_authorize_accepts_access_token() {
        let codec = TokenCodec::new(&test_config()).unwrap();
        let account_id = Uuid::new_v4();
        let token = codec.issue_access_token(&account_id, "a@x.com").unwrap();

        let claims = authorize(&codec, &token).expect("access token should pass the gate");
        assert_eq!(claims.account_id().unwrap(), account_id);
    }

    #[test]
    fn test_authorize_rejects_refresh_token() {
        let codec = TokenCodec::new(&test_config()).unwrap();
        let token = codec.issue_refresh_token(&Uuid::new_v4(), "a@x.com").unwrap();

        assert_eq!(authorize(&codec, &token).unwrap_err(), AuthError::Unauthorized);
    }

    #[test]
    fn test_authorize_collapses_expiry_into_unauthorized() {
        let mut config = test_config();
        config.access_token_expiry = -10;
        let codec = TokenCodec::new(&config).unwrap();
        let token = codec.issue_access_token(&Uuid::new_v4(), "a@x.com").unwrap();

        assert_eq!(authorize(&codec, &token).unwrap_err(), AuthError::Unauthorized);
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("BearerToken"), None);
        assert_eq!(bearer_token(""), None);
    }
}
