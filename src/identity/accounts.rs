//! Signup and the two login paths.
//!
//! Both login paths end in [`TokenService::issue_session`], so a password
//! login and a Google login produce tokens of the same shape.

use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    google::GoogleVerifier,
    password::{PasswordHasher, FEDERATED_ONLY_HASH},
    token::{TokenError, TokenService},
    User,
};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("email already registered")]
    EmailTaken,
    #[error("incorrect username or password")]
    InvalidCredentials,
    #[error("invalid federated assertion")]
    InvalidAssertion,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for AccountError {
    fn from(err: TokenError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[derive(Clone)]
pub struct Accounts {
    store: Arc<dyn Store>,
    hasher: PasswordHasher,
    tokens: Arc<TokenService>,
    google: Option<Arc<GoogleVerifier>>,
}

impl Accounts {
    /// `google` is `None` when federated login is not configured; every
    /// assertion is then rejected.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        hasher: PasswordHasher,
        tokens: Arc<TokenService>,
        google: Option<Arc<GoogleVerifier>>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            google,
        }
    }

    /// Create a password account.
    ///
    /// The existence check and the insert are separate calls; a concurrent
    /// signup for the same email is caught by the store's unique constraint
    /// and reported as [`AccountError::EmailTaken`] too.
    ///
    /// # Errors
    /// Validation failures, a taken email, or a storage failure.
    pub async fn signup(&self, email: &str, password: &str) -> Result<User, AccountError> {
        if !valid_email(email) {
            return Err(AccountError::InvalidEmail);
        }
        if password.is_empty() {
            return Err(AccountError::EmptyPassword);
        }

        if self.store.find_user_by_email(email).await?.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let hash = self.hash(password).await?;
        let user = match self.store.insert_user(&User::new(email, hash)).await {
            Ok(user) => user,
            Err(StoreError::Duplicate) => return Err(AccountError::EmailTaken),
            Err(err) => return Err(err.into()),
        };

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Check a password and issue a session token.
    ///
    /// An unknown email, or a federated-only account, costs one decoy
    /// verification so the response time does not reveal whether the account
    /// exists.
    ///
    /// # Errors
    /// [`AccountError::InvalidCredentials`] for any mismatch.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AccountError> {
        let user = self.store.find_user_by_email(email).await?;

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let stored_hash = user.as_ref().map(|user| user.password_hash.clone());
        let verified = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => hasher.verify(&password, &hash),
            None => hasher.verify_decoy(&password),
        })
        .await
        .map_err(|err| AccountError::Internal(err.to_string()))?;

        match user {
            Some(user) if verified => Ok(self.tokens.issue_session(&user.email)?),
            _ => {
                debug!("password login rejected");
                Err(AccountError::InvalidCredentials)
            }
        }
    }

    /// Verify a Google ID token, provision the account on first use, and
    /// issue a session token.
    ///
    /// Repeating the call for the same email never creates a second user.
    ///
    /// # Errors
    /// [`AccountError::InvalidAssertion`] for any verification failure.
    pub async fn login_with_assertion(&self, assertion: &str) -> Result<String, AccountError> {
        let Some(google) = &self.google else {
            debug!("google login attempted but no client id is configured");
            return Err(AccountError::InvalidAssertion);
        };

        let identity = google.verify(assertion).await.map_err(|err| {
            debug!("google assertion rejected: {err}");
            AccountError::InvalidAssertion
        })?;

        let user = match self.store.find_user_by_email(&identity.email).await? {
            Some(user) => user,
            None => self.provision_federated(&identity.email).await?,
        };

        Ok(self.tokens.issue_session(&user.email)?)
    }

    async fn provision_federated(&self, email: &str) -> Result<User, AccountError> {
        match self
            .store
            .insert_user(&User::new(email, FEDERATED_ONLY_HASH))
            .await
        {
            Ok(user) => {
                info!(user_id = %user.id, "federated user provisioned");
                Ok(user)
            }
            // Lost a race with a concurrent first login; use the winner's row.
            Err(StoreError::Duplicate) => {
                self.store
                    .find_user_by_email(email)
                    .await?
                    .ok_or_else(|| {
                        warn!("duplicate federated user vanished before re-read");
                        AccountError::Internal("federated user not found after insert".into())
                    })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn hash(&self, password: &str) -> Result<String, AccountError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|err| AccountError::Internal(err.to_string()))?
            .map_err(|err| AccountError::Internal(err.to_string()))
    }
}

impl std::fmt::Debug for Accounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accounts")
            .field("google", &self.google.is_some())
            .finish_non_exhaustive()
    }
}
