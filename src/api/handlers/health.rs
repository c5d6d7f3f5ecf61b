use crate::{store::Store, GIT_COMMIT_HASH};
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    status: String,
    /// `connected` or `disconnected`.
    db: String,
}

#[utoipa::path(
    get,
    path= "/healthz",
    responses (
        (status = 200, description = "Service is up; `db` reports the database ping", body = Health),
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(Extension(store): Extension<Arc<dyn Store>>) -> impl IntoResponse {
    // A failed ping degrades the body, never the status code.
    let db = match store.ping().await {
        Ok(()) => {
            debug!("Database connection is healthy");
            "connected"
        }
        Err(err) => {
            error!("Failed to ping database: {}", err);
            "disconnected"
        }
    };

    let health = Health {
        status: "ok".to_string(),
        db: db.to_string(),
    };

    let short_hash = if GIT_COMMIT_HASH.len() > 7 {
        &GIT_COMMIT_HASH[0..7]
    } else {
        ""
    };

    let headers = format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash
    )
    .parse::<HeaderValue>()
    .map(|x_app_header_value| {
        debug!("X-App header: {:?}", x_app_header_value);

        let mut headers = HeaderMap::new();

        headers.insert("X-App", x_app_header_value);

        headers
    })
    .map_err(|err| {
        error!("Failed to parse X-App header: {}", err);
    });

    let headers = headers.unwrap_or_else(|()| HeaderMap::new());

    (StatusCode::OK, headers, Json(health))
}
