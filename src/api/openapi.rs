use super::{
    error::ErrorBody,
    handlers::{auth, health, patients},
};
use crate::records::{
    AirwayExam, AuditDraft, AuditEntry, Demographics, MedicalHistory, Patient, PatientDraft,
    PatientFields, Recommendation,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::signup,
        auth::login,
        auth::google,
        patients::list_patients,
        patients::create_patient,
        patients::get_patient,
        patients::update_patient,
        patients::list_audit_logs,
        patients::create_audit_log,
    ),
    components(schemas(
        ErrorBody,
        health::Health,
        auth::types::SignupRequest,
        auth::types::UserResponse,
        auth::types::LoginForm,
        auth::types::GoogleLoginRequest,
        auth::types::TokenResponse,
        Patient,
        PatientDraft,
        PatientFields,
        Demographics,
        MedicalHistory,
        AirwayExam,
        Recommendation,
        AuditEntry,
        AuditDraft,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Signup and session tokens"),
        (name = "patients", description = "Owner-scoped patient records and audit logs"),
        (name = "health", description = "Liveness"),
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// The generated `OpenAPI` document, served at `/api-docs/openapi.json`.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
