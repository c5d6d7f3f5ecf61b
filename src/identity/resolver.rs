use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::{token::TokenService, User};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Bad, expired or orphaned token. Callers see a single 401.
    #[error("not authenticated")]
    Unauthenticated,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turns a bearer token into the user it was issued for.
#[derive(Clone)]
pub struct IdentityResolver {
    tokens: Arc<TokenService>,
    store: Arc<dyn Store>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(tokens: Arc<TokenService>, store: Arc<dyn Store>) -> Self {
        Self { tokens, store }
    }

    /// # Errors
    /// [`ResolveError::Unauthenticated`] when the token fails verification or
    /// its subject no longer exists; [`ResolveError::Store`] when the lookup
    /// itself fails.
    pub async fn resolve(&self, token: &str) -> Result<User, ResolveError> {
        let subject = self.tokens.verify(token).map_err(|err| {
            debug!("rejected session token: {err}");
            ResolveError::Unauthenticated
        })?;

        match self.store.find_user_by_email(&subject).await? {
            Some(user) => Ok(user),
            None => {
                debug!("session subject has no matching user");
                Err(ResolveError::Unauthenticated)
            }
        }
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
