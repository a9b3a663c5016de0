/// Session Manager
///
/// Issues token pairs, rotates them on refresh and revokes them on logout.
/// Every account holds at most one refresh token at a time (stored as a
/// digest). A refresh token is honoured only while it verifies AND matches
/// the stored digest, which is what lets rotation and logout invalidate
/// tokens that are otherwise self-contained.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::auth::codec::{TokenCodec, TokenKind};
use crate::error::{AppError, AuthError};
use crate::store::{hash_token, CredentialStore};

const ACTION_START: &str = "SESSION_START";
const ACTION_ROTATE: &str = "SESSION_ROTATE";
const ACTION_END: &str = "SESSION_END";

/// A freshly issued access/refresh token pair
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct SessionManager {
    codec: TokenCodec,
    store: Arc<dyn CredentialStore>,
}

impl SessionManager {
    pub fn new(codec: TokenCodec, store: Arc<dyn CredentialStore>) -> Self {
        Self { codec, store }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    fn issue_pair(&self, account_id: &Uuid, email: &str) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.codec.issue_access_token(account_id, email)?,
            refresh_token: self.codec.issue_refresh_token(account_id, email)?,
        })
    }

    /// Issue a token pair after signup or login
    ///
    /// Overwrites whatever refresh token the account held before, so any
    /// earlier session's refresh token stops working.
    pub async fn start_session(&self, account_id: Uuid, email: &str) -> Result<TokenPair, AppError> {
        let pair = self.issue_pair(&account_id, email)?;

        self.store
            .set_refresh_token(account_id, Some(&hash_token(&pair.refresh_token)))
            .await?;

        AuditLog::success(ACTION_START, "Session started")
            .with_user_id(account_id)
            .emit();

        Ok(pair)
    }

    /// Exchange a refresh token for a new pair
    ///
    /// The presented token is single-use. Whatever the cause of a failure,
    /// the caller only sees `AuthError::InvalidRefreshToken`.
    pub async fn rotate(&self, presented: &str) -> Result<TokenPair, AppError> {
        let claims = self.codec.verify(presented, TokenKind::Refresh).map_err(|reason| {
            AuditLog::failure(ACTION_ROTATE, format!("Refresh token rejected: {}", reason)).emit();
            AuthError::InvalidRefreshToken
        })?;

        let account_id = claims.account_id().map_err(|reason| {
            AuditLog::failure(ACTION_ROTATE, format!("Refresh token rejected: {}", reason)).emit();
            AuthError::InvalidRefreshToken
        })?;

        let account = match self.store.get_account_by_id(account_id).await? {
            Some(account) => account,
            None => {
                AuditLog::failure(ACTION_ROTATE, "Refresh token for unknown account")
                    .with_user_id(account_id)
                    .emit();
                return Err(AuthError::InvalidRefreshToken.into());
            }
        };

        let presented_hash = hash_token(presented);
        if account.refresh_token_hash.as_deref() != Some(presented_hash.as_str()) {
            // Authentic but superseded: someone is replaying an old token.
            // Drop the live one too so the whole chain has to log in again.
            self.revoke_observed(account.id, account.refresh_token_hash.as_deref())
                .await?;
            AuditLog::failure(ACTION_ROTATE, "Refresh token reuse detected, session revoked")
                .with_user_id(account.id)
                .emit();
            return Err(AuthError::InvalidRefreshToken.into());
        }

        let pair = self.issue_pair(&account.id, &account.email)?;
        let swapped = self
            .store
            .swap_refresh_token(
                account.id,
                Some(&presented_hash),
                Some(&hash_token(&pair.refresh_token)),
            )
            .await?;

        if !swapped {
            AuditLog::failure(ACTION_ROTATE, "Lost concurrent rotation")
                .with_user_id(account.id)
                .emit();
            return Err(AuthError::InvalidRefreshToken.into());
        }

        AuditLog::success(ACTION_ROTATE, "Session rotated")
            .with_user_id(account.id)
            .emit();

        Ok(pair)
    }

    /// Clear the stored refresh token only if it is still `observed`
    ///
    /// A login that stored a new token after `observed` was read keeps it.
    async fn revoke_observed(
        &self,
        account_id: Uuid,
        observed: Option<&str>,
    ) -> Result<bool, AppError> {
        match observed {
            Some(hash) => self.store.swap_refresh_token(account_id, Some(hash), None).await,
            None => Ok(false),
        }
    }

    /// End the session a refresh token belongs to
    ///
    /// Always succeeds from the caller's point of view. A verified token
    /// clears the account's stored token outright; an unverifiable one
    /// (expired, forged, wrong key) only clears it if it is exactly the
    /// stored value, so a forged token can't log out somebody else.
    pub async fn end_session(&self, presented: &str) {
        let outcome = match self.codec.verify(presented, TokenKind::Refresh) {
            Ok(claims) => match claims.account_id() {
                Ok(account_id) => self
                    .store
                    .set_refresh_token(account_id, None)
                    .await
                    .map(|_| Some(account_id)),
                Err(_) => Ok(None),
            },
            Err(reason) => {
                tracing::debug!(reason = %reason, "Logout with unverifiable refresh token");
                match self.codec.claimed_account_id(presented) {
                    Some(account_id) => self
                        .store
                        .swap_refresh_token(account_id, Some(&hash_token(presented)), None)
                        .await
                        .map(|cleared| cleared.then_some(account_id)),
                    None => Ok(None),
                }
            }
        };

        match outcome {
            Ok(Some(account_id)) => {
                AuditLog::success(ACTION_END, "Session ended")
                    .with_user_id(account_id)
                    .emit();
            }
            Ok(None) => {
                AuditLog::success(ACTION_END, "Logout with no matching session").emit();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to clear refresh token during logout");
                AuditLog::failure(ACTION_END, "Refresh token could not be cleared").emit();
            }
        }
    }
}
