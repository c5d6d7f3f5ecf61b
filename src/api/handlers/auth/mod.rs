//! Signup, password login and Google login.
//!
//! All three are public. Login responses share one shape
//! (`{access_token, token_type: "bearer"}`) whichever path issued the token.

pub(crate) mod principal;
pub(crate) mod types;

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        Extension,
    },
    Form, Json,
};
use std::sync::Arc;
use tracing::instrument;

use crate::{api::ApiError, identity::Accounts};

pub use principal::CurrentUser;
use types::{GoogleLoginRequest, LoginForm, SignupRequest, TokenResponse, UserResponse};

#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    request_body = SignupRequest,
    responses (
        (status = 200, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid input or email already registered", body = crate::api::error::ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(accounts, payload))]
pub async fn signup(
    Extension(accounts): Extension<Arc<Accounts>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(request) = payload?;
    let user = accounts.signup(&request.email, &request.password).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses (
        (status = 200, description = "Session token issued", body = TokenResponse),
        (status = 401, description = "Incorrect username or password", body = crate::api::error::ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(accounts, form))]
pub async fn login(
    Extension(accounts): Extension<Arc<Accounts>>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Form(form) = form?;
    let token = accounts.login(&form.username, &form.password).await?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/google",
    request_body = GoogleLoginRequest,
    responses (
        (status = 200, description = "Session token issued", body = TokenResponse),
        (status = 401, description = "Invalid Google credential", body = crate::api::error::ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(accounts, payload))]
pub async fn google(
    Extension(accounts): Extension<Arc<Accounts>>,
    payload: Result<Json<GoogleLoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = payload?;
    let token = accounts.login_with_assertion(&request.credential).await?;
    Ok(Json(TokenResponse::bearer(token)))
}
