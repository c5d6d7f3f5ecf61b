//! Persistence collaborator for users, patient records and audit entries.
//!
//! The service talks to storage only through [`Store`]. Two implementations
//! exist:
//!
//! - [`PgStore`]: PostgreSQL via a `sqlx` pool. Nested record sections live in
//!   JSONB columns, `users.email` carries a `UNIQUE` constraint.
//! - [`MemoryStore`]: process-local maps behind a lock, used by tests and by
//!   `memory://` for local development.
//!
//! Ownership-scoped reads and writes take the owner id as part of the filter,
//! so a record owned by someone else is simply not matched. Updates are a single
//! match-then-set; no application-level locking is involved.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{str::FromStr, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::{
    identity::User,
    records::{AuditEntry, Patient, PatientFields},
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached (pool exhausted, connection refused, timeout).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// A uniqueness constraint rejected the write.
    #[error("duplicate key")]
    Duplicate,
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::Unavailable(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Duplicate,
            _ => Self::Backend(err.to_string()),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trip to the backend; used by `/healthz`.
    async fn ping(&self) -> StoreResult<()>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Insert a user. Fails with [`StoreError::Duplicate`] when the email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<User>;

    async fn insert_patient(&self, patient: &Patient) -> StoreResult<Patient>;

    /// Fetch a patient only if it exists **and** is owned by `owner`.
    async fn find_patient(&self, id: Uuid, owner: Uuid) -> StoreResult<Option<Patient>>;

    /// Patients owned by `owner` in id (insertion) order, at most `limit`.
    async fn find_patients(&self, owner: Uuid, limit: usize) -> StoreResult<Vec<Patient>>;

    /// Atomically replace the mutable fields of the patient matching `(id, owner)`.
    ///
    /// Returns `None` when nothing matched. `owner_id` and `created_at` are never written.
    async fn update_patient(
        &self,
        id: Uuid,
        owner: Uuid,
        fields: &PatientFields,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Patient>>;

    async fn insert_audit_entry(&self, entry: &AuditEntry) -> StoreResult<AuditEntry>;

    /// Entries for a patient, newest first, at most `limit`.
    async fn find_audit_entries(&self, patient_id: Uuid, limit: usize)
        -> StoreResult<Vec<AuditEntry>>;

    /// Release backend resources. Called once at shutdown.
    async fn close(&self);
}

/// Connection settings shared by every backend.
#[derive(Clone, Copy, Debug)]
pub struct StoreOptions {
    max_connections: u32,
    timeout: Duration,
}

impl StoreOptions {
    /// Defaults: 5 pooled connections and a 5 second acquire/statement timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_connections: 5,
            timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout = Duration::from_secs(seconds.max(1));
        self
    }

    #[must_use]
    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the store named by `dsn`: `memory://` or a `postgres://` URI.
///
/// # Errors
/// Returns an error if the DSN is malformed, uses an unsupported scheme, or the
/// database cannot be reached.
pub async fn connect(dsn: &str, options: StoreOptions) -> anyhow::Result<Arc<dyn Store>> {
    let parsed = Url::from_str(dsn).map_err(|err| anyhow::anyhow!("Invalid DSN: {err}"))?;
    match parsed.scheme() {
        "memory" => {
            info!("Using in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        "postgres" | "postgresql" => Ok(Arc::new(PgStore::connect(dsn, options).await?)),
        scheme => Err(anyhow::anyhow!("Unsupported DSN scheme: {scheme}")),
    }
}
