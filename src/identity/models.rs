use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A local account. `email` is the identity and is compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Argon2 PHC string, or [`super::password::FEDERATED_ONLY_HASH`] for
    /// accounts created through federated login.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a not-yet-persisted user with a fresh time-ordered id.
    #[must_use]
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }
}
