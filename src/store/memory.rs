use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Account, CredentialStore, NewAccount};
use crate::error::{AppError, AuthError};

/// Process-local credential store
///
/// Every write happens under one lock, so `swap_refresh_token` is atomic.
/// Accounts are kept in insertion order. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    accounts: RwLock<Vec<Account>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, AppError> {
        let mut accounts = self.accounts.write().await;

        if accounts.iter().any(|a| a.email == account.email) {
            return Err(AuthError::DuplicateAccount.into());
        }

        let created = Account {
            id: Uuid::new_v4(),
            name: account.name,
            email: account.email,
            password_hash: account.password_hash,
            refresh_token_hash: None,
            created_at: Utc::now(),
        };
        accounts.push(created.clone());

        Ok(created)
    }

    async fn get_account_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.accounts.read().await.iter().find(|a| a.id == id).cloned())
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(self.accounts.read().await.clone())
    }

    async fn set_refresh_token(&self, id: Uuid, token_hash: Option<&str>) -> Result<(), AppError> {
        if let Some(account) = self.accounts.write().await.iter_mut().find(|a| a.id == id) {
            account.refresh_token_hash = token_hash.map(str::to_string);
        }
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: Option<&str>,
        replacement: Option<&str>,
    ) -> Result<bool, AppError> {
        let mut accounts = self.accounts.write().await;

        match accounts.iter_mut().find(|a| a.id == id) {
            Some(account) if account.refresh_token_hash.as_deref() == expected => {
                account.refresh_token_hash = replacement.map(str::to_string);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
