//! Google Sign-In assertion verification.
//!
//! The browser hands us a Google ID token (an RS256 JWT). We check it offline
//! against Google's published JWKS, which is cached in memory:
//!
//! - keys are refreshed when the cache is older than `KEYSET_CACHE_TTL_SECONDS`
//!   or when a token names an unknown `kid` (key rotation);
//! - fetch attempts, failed ones included, happen at most once per
//!   `KEYSET_REFRESH_COOLDOWN_SECONDS`, and only one runs at a time while
//!   concurrent callers wait for it;
//! - a failed refresh keeps the previous keys so verification keeps working.

use anyhow::{Context, Result};
use jsonwebtoken::{
    decode, decode_header,
    jwk::{Jwk, JwkSet},
    Algorithm, DecodingKey, Validation,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

pub const DEFAULT_GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

const KEYSET_CACHE_TTL_SECONDS: u64 = 3600;
const KEYSET_REFRESH_COOLDOWN_SECONDS: u64 = 30;
const JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Error)]
pub enum AssertionError {
    #[error("malformed assertion")]
    Malformed,
    #[error("unknown signing key: {0}")]
    UnknownKey(String),
    #[error("assertion rejected: {0}")]
    Rejected(String),
    #[error("assertion carries no email")]
    MissingEmail,
    #[error("assertion email is not verified")]
    UnverifiedEmail,
}

/// Identity asserted by Google after every check passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub subject: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    // Boolean in current tokens; older ones carried the string form.
    #[serde(default)]
    email_verified: Option<Value>,
}

enum KeySource {
    Static,
    Remote { url: String, client: Client },
}

struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

impl KeyCache {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.is_some_and(|at| at.elapsed() < ttl)
    }
}

pub struct GoogleVerifier {
    client_id: String,
    source: KeySource,
    cache: RwLock<KeyCache>,
    // Time of the last fetch attempt. Held for the whole fetch.
    refresh_gate: Mutex<Option<Instant>>,
    cache_ttl: Duration,
    refresh_cooldown: Duration,
}

impl GoogleVerifier {
    /// Verifier that lazily fetches keys from `jwks_url` on first use.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new_remote(client_id: String, jwks_url: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(JWKS_FETCH_TIMEOUT_SECONDS))
            .build()
            .context("Failed to build JWKS HTTP client")?;
        Ok(Self {
            client_id,
            source: KeySource::Remote {
                url: jwks_url,
                client,
            },
            cache: RwLock::new(KeyCache {
                keys: HashMap::new(),
                fetched_at: None,
            }),
            refresh_gate: Mutex::new(None),
            cache_ttl: Duration::from_secs(KEYSET_CACHE_TTL_SECONDS),
            refresh_cooldown: Duration::from_secs(KEYSET_REFRESH_COOLDOWN_SECONDS),
        })
    }

    /// Verifier with a fixed keyset that is never refreshed.
    #[must_use]
    pub fn with_static_keys(client_id: String, keys: HashMap<String, DecodingKey>) -> Self {
        Self {
            client_id,
            source: KeySource::Static,
            cache: RwLock::new(KeyCache {
                keys,
                fetched_at: Some(Instant::now()),
            }),
            refresh_gate: Mutex::new(None),
            cache_ttl: Duration::from_secs(KEYSET_CACHE_TTL_SECONDS),
            refresh_cooldown: Duration::from_secs(KEYSET_REFRESH_COOLDOWN_SECONDS),
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Verify a Google ID token and return the asserted identity.
    ///
    /// # Errors
    /// Any failed check (format, key, signature, issuer, audience, expiry,
    /// email) is an [`AssertionError`].
    pub async fn verify(&self, assertion: &str) -> Result<FederatedIdentity, AssertionError> {
        let header = decode_header(assertion).map_err(|_| AssertionError::Malformed)?;
        if header.alg != Algorithm::RS256 {
            return Err(AssertionError::Rejected(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }
        let kid = header.kid.ok_or(AssertionError::Malformed)?;
        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let claims = decode::<GoogleClaims>(assertion, &key, &validation)
            .map_err(|err| AssertionError::Rejected(err.to_string()))?
            .claims;

        let email = claims
            .email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .ok_or(AssertionError::MissingEmail)?;

        let unverified = match &claims.email_verified {
            Some(Value::Bool(verified)) => !verified,
            Some(Value::String(verified)) => verified.eq_ignore_ascii_case("false"),
            _ => false,
        };
        if unverified {
            return Err(AssertionError::UnverifiedEmail);
        }

        Ok(FederatedIdentity {
            subject: claims.sub,
            email,
        })
    }

    /// Look up a decoding key by `kid`, refreshing the cache when allowed.
    ///
    /// A stale cache still answers when the refresh is throttled or fails.
    async fn key_for(&self, kid: &str) -> Result<DecodingKey, AssertionError> {
        {
            let cache = self.cache.read().await;
            if cache.is_fresh(self.cache_ttl) {
                if let Some(key) = cache.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        self.refresh_if_due().await;

        let cache = self.cache.read().await;
        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AssertionError::UnknownKey(kid.to_string()))
    }

    /// Fetch the JWKS unless an attempt happened within the cooldown. Callers
    /// queue on the gate, so a burst of requests produces a single fetch.
    async fn refresh_if_due(&self) {
        let KeySource::Remote { url, client } = &self.source else {
            return;
        };

        let mut last_attempt = self.refresh_gate.lock().await;
        if last_attempt.is_some_and(|at| at.elapsed() < self.refresh_cooldown) {
            debug!("google jwks refresh throttled");
            return;
        }
        *last_attempt = Some(Instant::now());

        if let Err(err) = self.fetch(url, client).await {
            warn!(url = %url, error = %err, "failed to refresh google jwks cache");
        }
    }

    async fn fetch(&self, url: &str, client: &Client) -> Result<()> {
        let jwks: JwkSet = client
            .get(url)
            .send()
            .await
            .context("JWKS request failed")?
            .error_for_status()
            .context("JWKS endpoint returned an error")?
            .json()
            .await
            .context("JWKS response is not valid JSON")?;

        let keys = keys_from_jwks(&jwks);
        debug!(count = keys.len(), "refreshed google jwks cache");

        let mut cache = self.cache.write().await;
        cache.keys = keys;
        cache.fetched_at = Some(Instant::now());
        Ok(())
    }
}

impl std::fmt::Debug for GoogleVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            KeySource::Static => "static",
            KeySource::Remote { url, .. } => url.as_str(),
        };
        f.debug_struct("GoogleVerifier")
            .field("client_id", &self.client_id)
            .field("source", &source)
            .finish_non_exhaustive()
    }
}

/// Usable RSA signing keys from a JWKS document, indexed by `kid`.
/// Keys without a `kid` or that fail to parse are skipped.
#[must_use]
pub fn keys_from_jwks(jwks: &JwkSet) -> HashMap<String, DecodingKey> {
    jwks.keys
        .iter()
        .filter_map(|jwk: &Jwk| {
            let kid = jwk.common.key_id.clone()?;
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => Some((kid, key)),
                Err(err) => {
                    warn!(kid = %kid, error = %err, "skipping unusable jwk");
                    None
                }
            }
        })
        .collect()
}
