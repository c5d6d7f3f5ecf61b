use clap::{Arg, ArgMatches, Command};
use secrecy::{ExposeSecret, SecretString};

use crate::identity::{google::DEFAULT_GOOGLE_JWKS_URL, token::MIN_SECRET_LEN};

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_JWKS_URL: &str = "google-jwks-url";

#[derive(Debug)]
pub struct Options {
    pub token_secret: SecretString,
    pub token_ttl_seconds: u64,
    pub google_client_id: Option<String>,
    pub google_jwks_url: String,
}

impl Options {
    /// Parse session-token and federated-login arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or too short, or the
    /// TTL is zero.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let token_secret = match matches.get_one::<String>(ARG_TOKEN_SECRET) {
            Some(value) if !value.is_empty() => SecretString::from(value.clone()),
            _ => anyhow::bail!("missing required argument: --{ARG_TOKEN_SECRET}"),
        };
        if token_secret.expose_secret().len() < MIN_SECRET_LEN {
            anyhow::bail!("--{ARG_TOKEN_SECRET} must be at least {MIN_SECRET_LEN} bytes");
        }

        let token_ttl_seconds = matches
            .get_one::<u64>(ARG_TOKEN_TTL_SECONDS)
            .copied()
            .unwrap_or(86_400);
        if token_ttl_seconds == 0 {
            anyhow::bail!("--{ARG_TOKEN_TTL_SECONDS} must be greater than zero");
        }

        let google_client_id = matches
            .get_one::<String>(ARG_GOOGLE_CLIENT_ID)
            .cloned()
            .filter(|v| !v.trim().is_empty());

        let google_jwks_url = matches
            .get_one::<String>(ARG_GOOGLE_JWKS_URL)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GOOGLE_JWKS_URL.to_string());

        Ok(Self {
            token_secret,
            token_ttl_seconds,
            google_client_id,
            google_jwks_url,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("HS256 signing secret for session tokens (at least 32 bytes)")
                .env("CHARTKEEPER_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Session token TTL in seconds")
                .env("CHARTKEEPER_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("Google OAuth client id; Google login is disabled when unset")
                .env("CHARTKEEPER_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_JWKS_URL)
                .long(ARG_GOOGLE_JWKS_URL)
                .help("URL of Google's ID token signing keys")
                .env("CHARTKEEPER_GOOGLE_JWKS_URL")
                .default_value(DEFAULT_GOOGLE_JWKS_URL),
        )
}
