use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::{
    identity::User,
    records::{AuditEntry, Patient, PatientFields},
};

#[derive(Debug, Default)]
struct Collections {
    users: Vec<User>,
    patients: Vec<Patient>,
    audit_entries: Vec<AuditEntry>,
}

/// In-process [`Store`] with the same matching rules as [`super::PgStore`].
///
/// Cheap to clone; clones share the same data.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let data = self.data.read();
        Ok(data.users.iter().find(|user| user.email == email).cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<User> {
        let mut data = self.data.write();
        // Mirrors the UNIQUE(email) constraint of the SQL schema.
        if data.users.iter().any(|existing| existing.email == user.email) {
            return Err(StoreError::Duplicate);
        }
        data.users.push(user.clone());
        Ok(user.clone())
    }

    async fn insert_patient(&self, patient: &Patient) -> StoreResult<Patient> {
        let mut data = self.data.write();
        if data.patients.iter().any(|existing| existing.id == patient.id) {
            return Err(StoreError::Duplicate);
        }
        data.patients.push(patient.clone());
        Ok(patient.clone())
    }

    async fn find_patient(&self, id: Uuid, owner: Uuid) -> StoreResult<Option<Patient>> {
        let data = self.data.read();
        Ok(data
            .patients
            .iter()
            .find(|patient| patient.id == id && patient.owner_id == owner)
            .cloned())
    }

    async fn find_patients(&self, owner: Uuid, limit: usize) -> StoreResult<Vec<Patient>> {
        let data = self.data.read();
        Ok(data
            .patients
            .iter()
            .filter(|patient| patient.owner_id == owner)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_patient(
        &self,
        id: Uuid,
        owner: Uuid,
        fields: &PatientFields,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Patient>> {
        let mut data = self.data.write();
        let Some(patient) = data
            .patients
            .iter_mut()
            .find(|patient| patient.id == id && patient.owner_id == owner)
        else {
            return Ok(None);
        };
        patient.fields = fields.clone();
        patient.updated_at = updated_at;
        Ok(Some(patient.clone()))
    }

    async fn insert_audit_entry(&self, entry: &AuditEntry) -> StoreResult<AuditEntry> {
        let mut data = self.data.write();
        if !data.patients.iter().any(|patient| patient.id == entry.patient_id) {
            return Err(StoreError::Backend(format!(
                "audit entry references unknown patient {}",
                entry.patient_id
            )));
        }
        data.audit_entries.push(entry.clone());
        Ok(entry.clone())
    }

    async fn find_audit_entries(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<AuditEntry>> {
        let data = self.data.read();
        // Walk newest-inserted first so equal timestamps keep insertion order reversed.
        let mut entries: Vec<AuditEntry> = data
            .audit_entries
            .iter()
            .rev()
            .filter(|entry| entry.patient_id == patient_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn close(&self) {}
}
