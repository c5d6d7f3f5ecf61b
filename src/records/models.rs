//! Patient record and audit entry types.
//!
//! Nested sections are explicit structs and reject unknown keys, so a payload
//! that drifts from the clinical form is a 400 rather than silently stored.
//! Section keys are camelCase on the wire; record metadata stays snake_case.

use chrono::{DateTime, Utc};
use serde::{de::IgnoredAny, Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Demographics {
    /// Client-side identifier (MRN or form id); stored verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub dob: String,
    pub age: u32,
    pub gender: String,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub bmi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MedicalHistory {
    pub conditions: Vec<String>,
    pub surgeries: Vec<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub smoking_status: String,
    pub alcohol_use: String,
    pub drug_use: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AirwayExam {
    pub mallampati_score: String,
    #[serde(default)]
    pub thyromental_distance_cm: Option<f64>,
    #[serde(default)]
    pub mouth_opening_cm: Option<f64>,
    pub neck_mobility: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Recommendation {
    pub id: String,
    pub text: String,
    pub category: String,
    pub checked: bool,
}

/// The caller-mutable content of a patient record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientFields {
    pub demographics: Demographics,
    pub medical_history: MedicalHistory,
    pub airway_exam: AirwayExam,
    pub recommendations: Vec<Recommendation>,
    pub clinician_notes: String,
}

/// A stored patient record. `owner_id` and `created_at` never change after insert.
/// The id goes out on the wire as `_id`, the key existing clients read.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Patient {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub owner_id: Uuid,
    #[serde(flatten)]
    pub fields: PatientFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for create and update.
///
/// Server-owned keys (`id`/`_id`, `owner_id`, `created_at`, `updated_at`) are
/// accepted so a client can resubmit a record it fetched, but their values are
/// discarded.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PatientDraft {
    #[serde(default, alias = "_id")]
    #[schema(value_type = Option<String>)]
    pub id: Option<IgnoredAny>,
    #[serde(default, rename = "owner_id")]
    #[schema(value_type = Option<String>)]
    pub owner_id: Option<IgnoredAny>,
    #[serde(default, rename = "created_at")]
    #[schema(value_type = Option<String>)]
    pub created_at: Option<IgnoredAny>,
    #[serde(default, rename = "updated_at")]
    #[schema(value_type = Option<String>)]
    pub updated_at: Option<IgnoredAny>,
    pub demographics: Demographics,
    pub medical_history: MedicalHistory,
    pub airway_exam: AirwayExam,
    #[serde(default)]
    pub recommendations: Option<Vec<Recommendation>>,
    #[serde(default)]
    pub clinician_notes: Option<String>,
}

impl PatientDraft {
    /// Keep only the caller-mutable content.
    #[must_use]
    pub fn into_fields(self) -> PatientFields {
        PatientFields {
            demographics: self.demographics,
            medical_history: self.medical_history,
            airway_exam: self.airway_exam,
            recommendations: self.recommendations.unwrap_or_default(),
            clinician_notes: self.clinician_notes.unwrap_or_default(),
        }
    }
}

/// One append-only audit line for a patient record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AuditEntry {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub patient_id: Uuid,
    pub user_id: Uuid,
    /// Acting user's email as it was when the entry was written.
    pub user_email: String,
    pub action: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AuditDraft {
    pub action: String,
    pub details: String,
}
