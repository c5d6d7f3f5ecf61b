//! Patient records and their append-only audit trail.

mod models;
mod service;

pub use models::{
    AirwayExam, AuditDraft, AuditEntry, Demographics, MedicalHistory, Patient, PatientDraft,
    PatientFields, Recommendation,
};
pub use service::{parse_id, PatientRecords, RecordError, MAX_LIST_RESULTS};
