//! HTTP surface: router assembly, middleware and server lifecycle.
//!
//! Collaborators are constructed once at startup and handed to handlers as
//! `Extension` layers. The store is opened before the listener binds and
//! closed after the last in-flight request finishes.

use crate::{
    api::handlers::{auth, health, patients},
    identity::{Accounts, GoogleVerifier, IdentityResolver, PasswordHasher, TokenService},
    records::PatientRecords,
    store::{self, Store, StoreOptions},
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use secrecy::SecretString;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod error;
pub mod handlers;
mod openapi;

pub use error::ApiError;
pub use openapi::openapi;

const DEFAULT_TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

/// Runtime settings for the HTTP service.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    token_secret: SecretString,
    token_ttl_seconds: u64,
    cors_origins: Vec<String>,
    google_client_id: Option<String>,
    google_jwks_url: String,
    store_options: StoreOptions,
}

impl ApiConfig {
    #[must_use]
    pub fn new(token_secret: SecretString) -> Self {
        Self {
            token_secret,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            google_client_id: None,
            google_jwks_url: crate::identity::google::DEFAULT_GOOGLE_JWKS_URL.to_string(),
            store_options: StoreOptions::new(),
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: u64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    #[must_use]
    pub fn with_google_client_id(mut self, client_id: Option<String>) -> Self {
        self.google_client_id = client_id.filter(|id| !id.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_google_jwks_url(mut self, url: String) -> Self {
        self.google_jwks_url = url;
        self
    }

    #[must_use]
    pub fn with_store_options(mut self, options: StoreOptions) -> Self {
        self.store_options = options;
        self
    }

    #[must_use]
    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        self.store_options
    }
}

/// Everything the handlers need, built once per process.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub accounts: Arc<Accounts>,
    pub resolver: Arc<IdentityResolver>,
    pub records: Arc<PatientRecords>,
}

impl Services {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        hasher: PasswordHasher,
        tokens: Arc<TokenService>,
        google: Option<Arc<GoogleVerifier>>,
    ) -> Self {
        Self {
            accounts: Arc::new(Accounts::new(
                store.clone(),
                hasher,
                tokens.clone(),
                google,
            )),
            resolver: Arc::new(IdentityResolver::new(tokens, store.clone())),
            records: Arc::new(PatientRecords::new(store.clone())),
            store,
        }
    }

    /// Build services from configuration around an already opened store.
    ///
    /// # Errors
    /// Returns an error if the token settings are rejected or the Google
    /// verifier cannot be built.
    pub fn from_config(store: Arc<dyn Store>, config: &ApiConfig) -> Result<Self> {
        let tokens = TokenService::new(&config.token_secret, config.token_ttl_seconds)
            .context("Invalid token configuration")?;
        let hasher = PasswordHasher::new().context("Failed to initialize password hasher")?;

        let google = match &config.google_client_id {
            Some(client_id) => {
                let verifier =
                    GoogleVerifier::new_remote(client_id.clone(), config.google_jwks_url.clone())?;
                info!(client_id = verifier.client_id(), "Google login enabled");
                Some(Arc::new(verifier))
            }
            None => {
                info!("Google login disabled: no client id configured");
                None
            }
        };

        Ok(Self::new(store, hasher, Arc::new(tokens), google))
    }
}

/// Route table without middleware.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/healthz", get(health::health))
        .route("/api/v1/auth/signup", post(auth::signup))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/google", post(auth::google))
        .route(
            "/api/v1/patients/",
            get(patients::list_patients).post(patients::create_patient),
        )
        .route(
            "/api/v1/patients",
            get(patients::list_patients).post(patients::create_patient),
        )
        .route(
            "/api/v1/patients/:id",
            get(patients::get_patient).put(patients::update_patient),
        )
        .route(
            "/api/v1/patients/:id/audit-logs",
            get(patients::list_audit_logs).post(patients::create_audit_log),
        )
}

/// The complete application: routes, docs, and the middleware stack.
#[must_use]
pub fn app(services: &Services, cors: CorsLayer) -> Router {
    router()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(services.accounts.clone()))
                .layer(Extension(services.resolver.clone()))
                .layer(Extension(services.records.clone()))
                .layer(Extension(services.store.clone())),
        )
}

/// CORS policy for the configured browser origins.
///
/// # Errors
/// Returns an error if an origin is not an absolute URL with a host.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| origin_header(origin))
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, config: ApiConfig) -> Result<()> {
    let cors = cors_layer(config.cors_origins())?;

    let store = store::connect(&dsn, config.store_options())
        .await
        .context("Failed to open store")?;

    let services = Services::from_config(store.clone(), &config)?;
    let app = app(&services, cors);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    store.close().await;
    info!("Store closed");

    served?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn origin_header(origin: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(origin.trim()).with_context(|| format!("Invalid CORS origin: {origin}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("CORS origin must include a valid host: {origin}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build CORS origin header")
}
