//! Owner-scoped access to patient records and their audit trail.
//!
//! Every operation takes the authenticated [`User`] explicitly. Record ids are
//! parsed before any storage call, and a record owned by someone else is
//! reported exactly like one that does not exist.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AuditDraft, AuditEntry, Patient, PatientDraft};
use crate::{
    identity::User,
    store::{Store, StoreError},
};

/// Hard cap on list results. Lists are not paged.
pub const MAX_LIST_RESULTS: usize = 1000;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid patient id")]
    InvalidId,
    #[error("patient not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parse a caller-supplied record id.
///
/// # Errors
/// [`RecordError::InvalidId`] unless `raw` is a UUID.
pub fn parse_id(raw: &str) -> Result<Uuid, RecordError> {
    Uuid::parse_str(raw).map_err(|_| RecordError::InvalidId)
}

#[derive(Clone)]
pub struct PatientRecords {
    store: Arc<dyn Store>,
}

impl PatientRecords {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// # Errors
    /// Storage failures only.
    pub async fn create(&self, user: &User, draft: PatientDraft) -> Result<Patient, RecordError> {
        let now = Utc::now();
        let patient = Patient {
            id: Uuid::now_v7(),
            owner_id: user.id,
            fields: draft.into_fields(),
            created_at: now,
            updated_at: now,
        };
        let stored = self.store.insert_patient(&patient).await?;
        info!(patient_id = %stored.id, "patient created");
        Ok(stored)
    }

    /// Records owned by `user` in creation order, at most [`MAX_LIST_RESULTS`].
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn list(&self, user: &User) -> Result<Vec<Patient>, RecordError> {
        Ok(self.store.find_patients(user.id, MAX_LIST_RESULTS).await?)
    }

    /// # Errors
    /// [`RecordError::InvalidId`] or [`RecordError::NotFound`].
    pub async fn get(&self, user: &User, id: &str) -> Result<Patient, RecordError> {
        let id = parse_id(id)?;
        self.owned(user, id).await
    }

    /// Replace the mutable sections. Owner and `created_at` are kept,
    /// `updated_at` moves to now.
    ///
    /// # Errors
    /// [`RecordError::InvalidId`] or [`RecordError::NotFound`].
    pub async fn update(
        &self,
        user: &User,
        id: &str,
        draft: PatientDraft,
    ) -> Result<Patient, RecordError> {
        let id = parse_id(id)?;
        let updated = self
            .store
            .update_patient(id, user.id, &draft.into_fields(), Utc::now())
            .await?
            .ok_or(RecordError::NotFound)?;
        info!(patient_id = %updated.id, "patient updated");
        Ok(updated)
    }

    /// Append an audit entry stamped with the acting user and the current time.
    ///
    /// # Errors
    /// [`RecordError::InvalidId`], [`RecordError::NotFound`], or
    /// [`RecordError::Validation`] for an empty action.
    pub async fn append_audit(
        &self,
        user: &User,
        patient_id: &str,
        draft: AuditDraft,
    ) -> Result<AuditEntry, RecordError> {
        let patient_id = parse_id(patient_id)?;
        if draft.action.trim().is_empty() {
            return Err(RecordError::Validation("Action must not be empty".to_string()));
        }
        let patient = self.owned(user, patient_id).await?;

        let entry = AuditEntry {
            id: Uuid::now_v7(),
            patient_id: patient.id,
            user_id: user.id,
            user_email: user.email.clone(),
            action: draft.action,
            details: draft.details,
            timestamp: Utc::now(),
        };
        Ok(self.store.insert_audit_entry(&entry).await?)
    }

    /// Audit entries for an owned patient, newest first, at most [`MAX_LIST_RESULTS`].
    ///
    /// # Errors
    /// [`RecordError::InvalidId`] or [`RecordError::NotFound`].
    pub async fn list_audit(
        &self,
        user: &User,
        patient_id: &str,
    ) -> Result<Vec<AuditEntry>, RecordError> {
        let patient_id = parse_id(patient_id)?;
        let patient = self.owned(user, patient_id).await?;
        Ok(self
            .store
            .find_audit_entries(patient.id, MAX_LIST_RESULTS)
            .await?)
    }

    async fn owned(&self, user: &User, id: Uuid) -> Result<Patient, RecordError> {
        self.store.find_patient(id, user.id).await?.ok_or_else(|| {
            debug!(patient_id = %id, "patient missing or not owned by caller");
            RecordError::NotFound
        })
    }
}

impl std::fmt::Debug for PatientRecords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatientRecords").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn draft(name: &str) -> PatientDraft {
        serde_json::from_value(json!({
            "_id": "forged",
            "owner_id": "forged-owner",
            "created_at": "2000-01-01T00:00:00Z",
            "demographics": {
                "name": name, "dob": "1980-01-01", "age": 45, "gender": "Female",
                "heightCm": 170.0, "weightKg": 65.0, "bmi": 22.5
            },
            "medicalHistory": {
                "conditions": [], "surgeries": [], "allergies": [], "medications": [],
                "smokingStatus": "Never", "alcoholUse": "None", "drugUse": "None"
            },
            "airwayExam": { "mallampatiScore": "I", "neckMobility": "Normal" },
            "recommendations": [
                { "id": "r1", "text": "Video laryngoscope", "category": "airway", "checked": false }
            ],
            "clinicianNotes": "none"
        }))
        .unwrap()
    }

    async fn setup() -> (PatientRecords, User, User) {
        let store = Arc::new(MemoryStore::new());
        let alice = store.insert_user(&User::new("a@x.com", "h")).await.unwrap();
        let bob = store.insert_user(&User::new("b@x.com", "h")).await.unwrap();
        (PatientRecords::new(store), alice, bob)
    }

    #[tokio::test]
    async fn create_ignores_forged_fields() {
        let (records, alice, _) = setup().await;
        let before = Utc::now();
        let patient = records.create(&alice, draft("Ada")).await.unwrap();
        assert_eq!(patient.owner_id, alice.id);
        assert!(patient.created_at >= before);
        assert_eq!(patient.created_at, patient.updated_at);
        assert_eq!(patient.fields.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn other_owner_sees_not_found() {
        let (records, alice, bob) = setup().await;
        let patient = records.create(&alice, draft("Ada")).await.unwrap();
        let id = patient.id.to_string();
        let missing = Uuid::now_v7().to_string();

        assert!(matches!(records.get(&bob, &id).await, Err(RecordError::NotFound)));
        assert!(matches!(records.get(&bob, &missing).await, Err(RecordError::NotFound)));
        assert!(matches!(
            records.update(&bob, &id, draft("Eve")).await,
            Err(RecordError::NotFound)
        ));
        assert!(matches!(
            records.list_audit(&bob, &id).await,
            Err(RecordError::NotFound)
        ));
        assert!(records.list(&bob).await.unwrap().is_empty());
        assert_eq!(records.get(&alice, &id).await.unwrap(), patient);
    }

    #[tokio::test]
    async fn malformed_id_is_distinct_from_not_found() {
        let (records, alice, _) = setup().await;
        for id in ["P1", "", "507f1f77bcf86cd799439011"] {
            assert!(matches!(records.get(&alice, id).await, Err(RecordError::InvalidId)));
        }
    }

    #[tokio::test]
    async fn update_keeps_owner_and_created_at() {
        let (records, alice, _) = setup().await;
        let created = records.create(&alice, draft("Ada")).await.unwrap();
        let updated = records
            .update(&alice, &created.id.to_string(), draft("Ada Lovelace"))
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.owner_id, alice.id);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.fields.demographics.name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn audit_trail_newest_first() {
        let (records, alice, _) = setup().await;
        let patient = records.create(&alice, draft("Ada")).await.unwrap();
        let id = patient.id.to_string();
        for action in ["viewed", "edited"] {
            let entry = records
                .append_audit(
                    &alice,
                    &id,
                    AuditDraft {
                        action: action.to_string(),
                        details: String::new(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(entry.user_email, "a@x.com");
            assert_eq!(entry.user_id, alice.id);
        }
        let entries = records.list_audit(&alice, &id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].timestamp >= entries[1].timestamp);
        assert_eq!(entries[0].action, "edited");
    }

    #[tokio::test]
    async fn audit_rejects_empty_action_and_foreign_patient() {
        let (records, alice, bob) = setup().await;
        let patient = records.create(&alice, draft("Ada")).await.unwrap();
        let id = patient.id.to_string();
        let empty = AuditDraft {
            action: "  ".to_string(),
            details: String::new(),
        };
        assert!(matches!(
            records.append_audit(&alice, &id, empty).await,
            Err(RecordError::Validation(_))
        ));
        let foreign = AuditDraft {
            action: "viewed".to_string(),
            details: String::new(),
        };
        assert!(matches!(
            records.append_audit(&bob, &id, foreign).await,
            Err(RecordError::NotFound)
        ));
    }
}
