//! Session tokens: HS256 JWTs carrying the subject email and an absolute expiry.
//!
//! Tokens are not persisted. A token is accepted only while the signature
//! verifies with the process-wide secret and `now < exp`; there is no refresh.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signing secret must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,
    #[error("token ttl must be positive")]
    InvalidTtl,
    #[error("failed to sign token")]
    Signing,
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    /// # Errors
    /// Returns [`TokenError::WeakSecret`] for secrets shorter than
    /// [`MIN_SECRET_LEN`] and [`TokenError::InvalidTtl`] for a zero TTL.
    pub fn new(secret: &SecretString, ttl_seconds: u64) -> Result<Self, TokenError> {
        let bytes = secret.expose_secret().as_bytes();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }
        let ttl_seconds = i64::try_from(ttl_seconds).map_err(|_| TokenError::InvalidTtl)?;
        if ttl_seconds <= 0 {
            return Err(TokenError::InvalidTtl);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            ttl: Duration::seconds(ttl_seconds),
        })
    }

    /// Configured session lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a session token for `subject` using the configured TTL.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if encoding fails.
    pub fn issue_session(&self, subject: &str) -> Result<String, TokenError> {
        self.issue(subject, self.ttl)
    }

    /// Issue a token for `subject` expiring at `now + ttl`.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if encoding fails.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: subject.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| TokenError::Signing)
    }

    /// Verify a token and return its subject.
    ///
    /// # Errors
    /// Returns [`TokenError::Expired`] once `now >= exp`, [`TokenError::Invalid`]
    /// for bad signatures, wrong algorithms and malformed input.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(
            |err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            },
        )?;

        // jsonwebtoken accepts exp == now; sessions end at exp.
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        if data.claims.sub.is_empty() {
            return Err(TokenError::Invalid);
        }
        Ok(data.claims.sub)
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &"***")
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn service() -> TokenService {
        TokenService::new(&secret("test-secret-key-at-least-32-bytes-long"), 3600).unwrap()
    }

    #[test]
    fn issue_and_verify_round_trip_subject() {
        let tokens = service();
        let token = tokens.issue_session("a@x.com").unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), "a@x.com");
    }

    #[test]
    fn expiry_is_now_plus_ttl() {
        let tokens = service();
        let token = tokens.issue_session("a@x.com").unwrap();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        let claims = decode::<SessionClaims>(&token, &DecodingKey::from_secret(b""), &validation)
            .unwrap()
            .claims;
        assert!((claims.exp - (Utc::now().timestamp() + 3600)).abs() < 5);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn expired_token_rejected() {
        let tokens = service();
        let token = tokens.issue("a@x.com", Duration::seconds(-10)).unwrap();
        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn zero_ttl_token_is_already_expired() {
        let tokens = service();
        let token = tokens.issue("a@x.com", Duration::zero()).unwrap();
        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn wrong_secret_rejected() {
        let first = service();
        let second =
            TokenService::new(&secret("another-secret-key-at-least-32-bytes"), 3600).unwrap();
        let token = first.issue_session("a@x.com").unwrap();
        assert_eq!(second.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn malformed_tokens_rejected() {
        let tokens = service();
        for token in ["", "abc", "a.b.c", "Bearer x.y.z"] {
            assert_eq!(tokens.verify(token), Err(TokenError::Invalid));
        }
    }

    #[test]
    fn tampered_payload_rejected() {
        let tokens = service();
        let token = tokens.issue_session("a@x.com").unwrap();
        let other = tokens.issue_session("b@x.com").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);
        assert_eq!(tokens.verify(&forged), Err(TokenError::Invalid));
    }

    #[test]
    fn weak_secret_and_zero_ttl_refused() {
        assert_eq!(
            TokenService::new(&secret("short"), 3600).err(),
            Some(TokenError::WeakSecret)
        );
        assert_eq!(
            TokenService::new(&secret("test-secret-key-at-least-32-bytes-long"), 0).err(),
            Some(TokenError::InvalidTtl)
        );
    }
}
