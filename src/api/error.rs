//! Failure responses.
//!
//! Every error leaves the service as `{"detail": "<reason>"}`. Reasons are
//! stable strings that clients may match on.

use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection},
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::{
    identity::{AccountError, ResolveError},
    records::RecordError,
    store::StoreError,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug)]
pub enum ApiError {
    NotAuthenticated,
    InvalidToken,
    InvalidCredentials,
    InvalidGoogleCredential,
    InvalidPatientId,
    PatientNotFound,
    EmailTaken,
    Validation(String),
    Unavailable,
    Internal,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated
            | Self::InvalidToken
            | Self::InvalidCredentials
            | Self::InvalidGoogleCredential => StatusCode::UNAUTHORIZED,
            Self::InvalidPatientId | Self::EmailTaken | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PatientNotFound => StatusCode::NOT_FOUND,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::NotAuthenticated => "Not authenticated",
            Self::InvalidToken => "Could not validate credentials",
            Self::InvalidCredentials => "Incorrect username or password",
            Self::InvalidGoogleCredential => "Invalid Google credential",
            Self::InvalidPatientId => "Invalid patient ID",
            Self::PatientNotFound => "Patient not found",
            Self::EmailTaken => "Email already registered",
            Self::Validation(message) => message,
            Self::Unavailable => "Database unavailable",
            Self::Internal => "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (
            status,
            Json(ErrorBody {
                detail: self.detail().to_string(),
            }),
        )
            .into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => {
                error!("Database unavailable: {reason}");
                Self::Unavailable
            }
            StoreError::Duplicate => {
                error!("Unexpected duplicate key");
                Self::Internal
            }
            StoreError::Backend(reason) => {
                error!("Database error: {reason}");
                Self::Internal
            }
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidEmail => Self::Validation("Invalid email".to_string()),
            AccountError::EmptyPassword => {
                Self::Validation("Password must not be empty".to_string())
            }
            AccountError::EmailTaken => Self::EmailTaken,
            AccountError::InvalidCredentials => Self::InvalidCredentials,
            AccountError::InvalidAssertion => Self::InvalidGoogleCredential,
            AccountError::Store(err) => err.into(),
            AccountError::Internal(reason) => {
                error!("Account operation failed: {reason}");
                Self::Internal
            }
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Unauthenticated => Self::InvalidToken,
            ResolveError::Store(err) => err.into(),
        }
    }
}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::InvalidId => Self::InvalidPatientId,
            RecordError::NotFound => Self::PatientNotFound,
            RecordError::Validation(message) => Self::Validation(message),
            RecordError::Store(err) => err.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected JSON body: {rejection}");
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path parameter: {rejection}");
        Self::InvalidPatientId
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        debug!("Rejected form body: {rejection}");
        Self::Validation(rejection.body_text())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_table() {
        let cases = [
            (ApiError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (ApiError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ApiError::InvalidGoogleCredential, StatusCode::UNAUTHORIZED),
            (ApiError::InvalidPatientId, StatusCode::BAD_REQUEST),
            (ApiError::EmailTaken, StatusCode::BAD_REQUEST),
            (ApiError::PatientNotFound, StatusCode::NOT_FOUND),
            (ApiError::Unavailable, StatusCode::SERVICE_UNAVAILABLE),
            (ApiError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error:?}");
        }
    }

    #[test]
    fn unauthorized_carries_bearer_challenge() {
        let response = ApiError::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");

        let response = ApiError::PatientNotFound.into_response();
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn store_errors_map_to_service_status() {
        let unavailable: ApiError = StoreError::Unavailable("down".into()).into();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        let backend: ApiError = StoreError::Backend("boom".into()).into();
        assert_eq!(backend.detail(), "Internal server error");
    }

    #[test]
    fn record_errors_keep_ids_and_absence_apart() {
        let invalid: ApiError = RecordError::InvalidId.into();
        let missing: ApiError = RecordError::NotFound.into();
        assert_eq!(invalid.detail(), "Invalid patient ID");
        assert_eq!(missing.detail(), "Patient not found");
    }
}
