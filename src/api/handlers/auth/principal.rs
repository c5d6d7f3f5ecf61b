//! Authenticated caller extraction.
//!
//! Flow Overview: read the `Authorization: Bearer` header, resolve the token to
//! a stored user through [`IdentityResolver`], and hand that user to the
//! handler as an explicit argument. A handler that takes [`CurrentUser`] is
//! protected; one that does not is public.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::sync::Arc;
use tracing::error;

use crate::{
    api::ApiError,
    identity::{IdentityResolver, User},
};

/// The user a request's bearer token belongs to.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or(ApiError::NotAuthenticated)?;
        let resolver = parts
            .extensions
            .get::<Arc<IdentityResolver>>()
            .cloned()
            .ok_or_else(|| {
                error!("IdentityResolver extension missing from router");
                ApiError::Internal
            })?;
        let user = resolver.resolve(&token).await?;
        Ok(Self(user))
    }
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
