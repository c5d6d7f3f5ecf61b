use crate::{
    api::{self, ApiConfig},
    cli::telemetry,
    store::StoreOptions,
};
use anyhow::Result;
use secrecy::SecretString;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub store_options: StoreOptions,
    pub token_secret: SecretString,
    pub token_ttl_seconds: u64,
    pub cors_origins: Vec<String>,
    pub google_client_id: Option<String>,
    pub google_jwks_url: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is rejected, the store cannot be
/// opened, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = ApiConfig::new(args.token_secret)
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_cors_origins(args.cors_origins)
        .with_google_client_id(args.google_client_id)
        .with_google_jwks_url(args.google_jwks_url)
        .with_store_options(args.store_options);

    let result = api::new(args.port, args.dsn, config).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    info!(
        port = args.port,
        dsn = %redact_dsn(&args.dsn),
        db_max_connections = args.store_options.max_connections(),
        db_timeout_seconds = args.store_options.timeout().as_secs(),
        token_ttl_seconds = args.token_ttl_seconds,
        cors_origins = ?args.cors_origins,
        google_login = args.google_client_id.is_some(),
        "Starting chartkeeper"
    );
}

/// DSN with the password replaced, safe to log.
fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some("***")).is_err() {
                return "<unparseable dsn>".to_string();
            }
            url.to_string()
        }
        Err(_) => "<unparseable dsn>".to_string(),
    }
}
