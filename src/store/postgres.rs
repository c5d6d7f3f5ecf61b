use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    types::Json,
    Connection, FromRow, PgPool,
};
use std::str::FromStr;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{Store, StoreOptions, StoreResult};
use crate::{
    identity::User,
    records::{
        AirwayExam, AuditEntry, Demographics, MedicalHistory, Patient, PatientFields,
        Recommendation,
    },
};

const PATIENT_COLUMNS: &str = "id, owner_id, demographics, medical_history, airway_exam, \
     recommendations, clinician_notes, created_at, updated_at";

const AUDIT_COLUMNS: &str =
    "id, patient_id, user_id, user_email, action, details, created_at AS timestamp";

#[derive(FromRow)]
struct PatientRow {
    id: Uuid,
    owner_id: Uuid,
    demographics: Json<Demographics>,
    medical_history: Json<MedicalHistory>,
    airway_exam: Json<AirwayExam>,
    recommendations: Json<Vec<Recommendation>>,
    clinician_notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PatientRow> for Patient {
    fn from(row: PatientRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            fields: PatientFields {
                demographics: row.demographics.0,
                medical_history: row.medical_history.0,
                airway_exam: row.airway_exam.0,
                recommendations: row.recommendations.0,
                clinician_notes: row.clinician_notes,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct AuditRow {
    id: Uuid,
    patient_id: Uuid,
    user_id: Uuid,
    user_email: String,
    action: String,
    details: String,
    timestamp: DateTime<Utc>,
}

impl From<AuditRow> for AuditEntry {
    fn from(row: AuditRow) -> Self {
        Self {
            id: row.id,
            patient_id: row.patient_id,
            user_id: row.user_id,
            user_email: row.user_email,
            action: row.action,
            details: row.details,
            timestamp: row.timestamp,
        }
    }
}

/// PostgreSQL-backed [`Store`].
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Build a pool for `dsn`. Every connection gets a `statement_timeout`
    /// equal to the pool acquire timeout so no call blocks indefinitely.
    ///
    /// # Errors
    /// Returns an error if the DSN is invalid or the first connection fails.
    pub async fn connect(dsn: &str, options: StoreOptions) -> Result<Self> {
        let timeout_ms = options.timeout().as_millis().to_string();
        let connect_options = PgConnectOptions::from_str(dsn)
            .context("Invalid PostgreSQL DSN")?
            .options([("statement_timeout", timeout_ms.as_str())]);

        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(options.max_connections())
            .acquire_timeout(options.timeout())
            .test_before_acquire(true)
            .connect_with(connect_options)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.table = "users"
        );
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .instrument(span)
        .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<User> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.table = "users"
        );
        let user = sqlx::query_as::<_, User>(
            r"
            INSERT INTO users (id, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, created_at
            ",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .instrument(span)
        .await?;
        Ok(user)
    }

    async fn insert_patient(&self, patient: &Patient) -> StoreResult<Patient> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.table = "patients"
        );
        let query = format!(
            r"
            INSERT INTO patients (id, owner_id, demographics, medical_history, airway_exam,
                recommendations, clinician_notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PATIENT_COLUMNS}
            "
        );
        let fields = &patient.fields;
        let row = sqlx::query_as::<_, PatientRow>(&query)
            .bind(patient.id)
            .bind(patient.owner_id)
            .bind(Json(&fields.demographics))
            .bind(Json(&fields.medical_history))
            .bind(Json(&fields.airway_exam))
            .bind(Json(&fields.recommendations))
            .bind(&fields.clinician_notes)
            .bind(patient.created_at)
            .bind(patient.updated_at)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.into())
    }

    async fn find_patient(&self, id: Uuid, owner: Uuid) -> StoreResult<Option<Patient>> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.table = "patients"
        );
        let query =
            format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1 AND owner_id = $2");
        let row = sqlx::query_as::<_, PatientRow>(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.map(Patient::from))
    }

    async fn find_patients(&self, owner: Uuid, limit: usize) -> StoreResult<Vec<Patient>> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.table = "patients"
        );
        let query = format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE owner_id = $1 ORDER BY id LIMIT $2"
        );
        let rows = sqlx::query_as::<_, PatientRow>(&query)
            .bind(owner)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;
        Ok(rows.into_iter().map(Patient::from).collect())
    }

    async fn update_patient(
        &self,
        id: Uuid,
        owner: Uuid,
        fields: &PatientFields,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Patient>> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.table = "patients"
        );
        // Single statement keyed on (id, owner_id): a non-owner matches zero rows.
        let query = format!(
            r"
            UPDATE patients
            SET demographics = $3,
                medical_history = $4,
                airway_exam = $5,
                recommendations = $6,
                clinician_notes = $7,
                updated_at = $8
            WHERE id = $1 AND owner_id = $2
            RETURNING {PATIENT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, PatientRow>(&query)
            .bind(id)
            .bind(owner)
            .bind(Json(&fields.demographics))
            .bind(Json(&fields.medical_history))
            .bind(Json(&fields.airway_exam))
            .bind(Json(&fields.recommendations))
            .bind(&fields.clinician_notes)
            .bind(updated_at)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.map(Patient::from))
    }

    async fn insert_audit_entry(&self, entry: &AuditEntry) -> StoreResult<AuditEntry> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.table = "audit_logs"
        );
        let query = format!(
            r"
            INSERT INTO audit_logs (id, patient_id, user_id, user_email, action, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {AUDIT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, AuditRow>(&query)
            .bind(entry.id)
            .bind(entry.patient_id)
            .bind(entry.user_id)
            .bind(&entry.user_email)
            .bind(&entry.action)
            .bind(&entry.details)
            .bind(entry.timestamp)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.into())
    }

    async fn find_audit_entries(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<AuditEntry>> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.table = "audit_logs"
        );
        let query = format!(
            r"
            SELECT {AUDIT_COLUMNS} FROM audit_logs
            WHERE patient_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "
        );
        let rows = sqlx::query_as::<_, AuditRow>(&query)
            .bind(patient_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;
        Ok(rows.into_iter().map(AuditEntry::from).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
