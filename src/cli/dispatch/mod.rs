//! Command-line argument dispatch.
//!
//! Validated CLI matches become an [`Action`] carrying the full server
//! configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, database, ARG_CORS_ORIGINS, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8000);

    let database_opts = database::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    let cors_origins = matches
        .get_one::<String>(ARG_CORS_ORIGINS)
        .map(|value| split_origins(value))
        .unwrap_or_default();

    Ok(Action::Server(Args {
        port,
        dsn: database_opts.dsn,
        store_options: database_opts.store,
        token_secret: auth_opts.token_secret,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        cors_origins,
        google_client_id: auth_opts.google_client_id,
        google_jwks_url: auth_opts.google_jwks_url,
    }))
}

fn split_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const SECRET: &str = "dispatch-secret-key-at-least-32-bytes";

    #[test]
    fn split_origins_trims_and_drops_blanks() {
        assert_eq!(
            split_origins(" http://a.test , ,https://b.test:8443"),
            vec!["http://a.test".to_string(), "https://b.test:8443".to_string()]
        );
    }

    #[test]
    fn builds_server_action_from_env() {
        temp_env::with_vars(
            [
                ("CHARTKEEPER_DSN", Some("memory://")),
                ("CHARTKEEPER_TOKEN_SECRET", Some(SECRET)),
                ("CHARTKEEPER_CORS_ORIGINS", Some("http://a.test,http://b.test")),
                ("CHARTKEEPER_GOOGLE_CLIENT_ID", Some("")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["chartkeeper"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.port, 8000);
                    assert_eq!(args.dsn, "memory://");
                    assert_eq!(args.token_secret.expose_secret(), SECRET);
                    assert_eq!(args.token_ttl_seconds, 86_400);
                    assert_eq!(args.cors_origins.len(), 2);
                    assert!(args.google_client_id.is_none());
                }
            },
        );
    }

    #[test]
    fn short_token_secret_rejected() {
        temp_env::with_vars(
            [
                ("CHARTKEEPER_DSN", Some("memory://")),
                ("CHARTKEEPER_TOKEN_SECRET", Some("too-short")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["chartkeeper"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("at least 32 bytes"));
                }
            },
        );
    }

    #[test]
    fn zero_ttl_rejected() {
        temp_env::with_vars(
            [
                ("CHARTKEEPER_DSN", Some("memory://")),
                ("CHARTKEEPER_TOKEN_SECRET", Some(SECRET)),
                ("CHARTKEEPER_TOKEN_TTL_SECONDS", Some("0")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["chartkeeper"]);
                assert!(handler(&matches).is_err());
            },
        );
    }
}
