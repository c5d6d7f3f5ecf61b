//! Patient record and audit log endpoints. All of them require a bearer token.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path,
    },
    Json,
};
use std::sync::Arc;
use tracing::{field, instrument, Span};

use super::auth::CurrentUser;
use crate::{
    api::{error::ErrorBody, ApiError},
    records::{AuditDraft, AuditEntry, Patient, PatientDraft, PatientRecords},
};

#[utoipa::path(
    get,
    path = "/api/v1/patients/",
    responses (
        (status = 200, description = "Patients owned by the caller (at most 1000)", body = [Patient]),
        (status = 401, description = "Not authenticated", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "patients"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_patients(
    CurrentUser(user): CurrentUser,
    Extension(records): Extension<Arc<PatientRecords>>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    Ok(Json(records.list(&user).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/patients/",
    request_body = PatientDraft,
    responses (
        (status = 200, description = "Patient created", body = Patient),
        (status = 400, description = "Malformed record", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "patients"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_patient(
    CurrentUser(user): CurrentUser,
    Extension(records): Extension<Arc<PatientRecords>>,
    payload: Result<Json<PatientDraft>, JsonRejection>,
) -> Result<Json<Patient>, ApiError> {
    let Json(draft) = payload?;
    Ok(Json(records.create(&user, draft).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses (
        (status = 200, description = "Patient", body = Patient),
        (status = 400, description = "Invalid patient ID", body = ErrorBody),
        (status = 404, description = "Patient not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "patients"
)]
#[instrument(skip_all, fields(user_id = %user.id, patient_id = field::Empty))]
pub async fn get_patient(
    CurrentUser(user): CurrentUser,
    Extension(records): Extension<Arc<PatientRecords>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Patient>, ApiError> {
    let id = patient_path(path)?;
    Ok(Json(records.get(&user, &id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    request_body = PatientDraft,
    responses (
        (status = 200, description = "Patient updated", body = Patient),
        (status = 400, description = "Invalid patient ID or malformed record", body = ErrorBody),
        (status = 404, description = "Patient not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "patients"
)]
#[instrument(skip_all, fields(user_id = %user.id, patient_id = field::Empty))]
pub async fn update_patient(
    CurrentUser(user): CurrentUser,
    Extension(records): Extension<Arc<PatientRecords>>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<PatientDraft>, JsonRejection>,
) -> Result<Json<Patient>, ApiError> {
    let id = patient_path(path)?;
    // Malformed ids win over malformed bodies.
    crate::records::parse_id(&id)?;
    let Json(draft) = payload?;
    Ok(Json(records.update(&user, &id, draft).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/patients/{id}/audit-logs",
    params(("id" = String, Path, description = "Patient id")),
    responses (
        (status = 200, description = "Audit entries, newest first (at most 1000)", body = [AuditEntry]),
        (status = 400, description = "Invalid patient ID", body = ErrorBody),
        (status = 404, description = "Patient not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "patients"
)]
#[instrument(skip_all, fields(user_id = %user.id, patient_id = field::Empty))]
pub async fn list_audit_logs(
    CurrentUser(user): CurrentUser,
    Extension(records): Extension<Arc<PatientRecords>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let id = patient_path(path)?;
    Ok(Json(records.list_audit(&user, &id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/patients/{id}/audit-logs",
    params(("id" = String, Path, description = "Patient id")),
    request_body = AuditDraft,
    responses (
        (status = 200, description = "Audit entry appended", body = AuditEntry),
        (status = 400, description = "Invalid patient ID or empty action", body = ErrorBody),
        (status = 404, description = "Patient not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "patients"
)]
#[instrument(skip_all, fields(user_id = %user.id, patient_id = field::Empty))]
pub async fn create_audit_log(
    CurrentUser(user): CurrentUser,
    Extension(records): Extension<Arc<PatientRecords>>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<AuditDraft>, JsonRejection>,
) -> Result<Json<AuditEntry>, ApiError> {
    let id = patient_path(path)?;
    crate::records::parse_id(&id)?;
    let Json(draft) = payload?;
    Ok(Json(records.append_audit(&user, &id, draft).await?))
}

/// Unwrap the `{id}` segment and tag the current span with it. Segments that
/// fail to decode are reported like any other malformed id.
fn patient_path(path: Result<Path<String>, PathRejection>) -> Result<String, ApiError> {
    let Path(id) = path?;
    Span::current().record("patient_id", id.as_str());
    Ok(id)
}
