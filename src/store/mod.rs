/// Credential Store
///
/// Persistence contract for accounts and their single stored refresh token.
/// The refresh token is stored as a SHA-256 digest; callers pass digests,
/// never plaintext tokens.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;

pub use memory::InMemoryCredentialStore;
pub use postgres::PostgresCredentialStore;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to register an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new account
    ///
    /// # Errors
    /// `AuthError::DuplicateAccount` if the email is already registered
    async fn create_account(&self, account: NewAccount) -> Result<Account, AppError>;

    async fn get_account_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;

    /// All accounts, oldest first
    async fn list_accounts(&self) -> Result<Vec<Account>, AppError>;

    /// Overwrite the stored refresh token digest; `None` clears it
    async fn set_refresh_token(&self, id: Uuid, token_hash: Option<&str>) -> Result<(), AppError>;

    /// Atomically replace the stored digest if it still equals `expected`
    ///
    /// Returns `false` if the account does not exist or holds a different
    /// value, in which case nothing is written.
    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: Option<&str>,
        replacement: Option<&str>,
    ) -> Result<bool, AppError>;
}

/// SHA-256 hex digest of a refresh token, as persisted by the store
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
