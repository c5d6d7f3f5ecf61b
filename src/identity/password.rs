//! Password hashing with Argon2id.
//!
//! Hashes are PHC strings (`$argon2id$v=19$...`). Verification reads the
//! parameters from the stored hash, so cost settings can change without
//! invalidating existing accounts.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use thiserror::Error;

/// Stored in place of a hash for accounts that may only sign in through a
/// federated identity. It does not start with `$`, so it can never parse as a
/// PHC string and every password check against it fails.
pub const FEDERATED_ONLY_HASH: &str = "!federated-only";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid argon2 parameters")]
    Params,
    #[error("failed to hash password")]
    Hash,
}

#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    // Verified against when the account does not exist so both branches cost the same.
    decoy_hash: String,
}

impl PasswordHasher {
    /// Argon2id with the crate defaults (19 MiB, 2 passes).
    ///
    /// # Errors
    /// Returns an error if the decoy hash cannot be computed.
    pub fn new() -> Result<Self, PasswordError> {
        Self::with_params(Params::default())
    }

    /// Minimal-cost parameters for tests. Never use for real accounts.
    ///
    /// # Errors
    /// Returns an error if the parameters are rejected.
    pub fn insecure_fast() -> Result<Self, PasswordError> {
        let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, 1, None)
            .map_err(|_| PasswordError::Params)?;
        Self::with_params(params)
    }

    fn with_params(params: Params) -> Result<Self, PasswordError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let decoy: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let decoy_hash = hash_with(&argon2, &decoy)?;
        Ok(Self { argon2, decoy_hash })
    }

    /// Hash a password with a fresh random salt.
    ///
    /// # Errors
    /// Returns an error if Argon2 fails (e.g. the password exceeds its length limit).
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        hash_with(&self.argon2, password)
    }

    /// Check `password` against a stored hash. Malformed hashes, including
    /// [`FEDERATED_ONLY_HASH`], return `false` after the same Argon2 work as a
    /// real mismatch.
    #[must_use]
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        self.check(password, hash) == Check::Matched
    }

    /// Burn one verification against the decoy hash and return `false`.
    #[must_use]
    pub fn verify_decoy(&self, password: &str) -> bool {
        let _ = self.check(password, &self.decoy_hash);
        false
    }

    fn check(&self, password: &str, hash: &str) -> Check {
        let Ok(parsed) = PasswordHash::new(hash) else {
            let _ = self.verify_decoy(password);
            return Check::Decoy;
        };
        if self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
        {
            Check::Matched
        } else {
            Check::Mismatched
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    Matched,
    Mismatched,
    /// The stored hash was not a PHC string; the decoy was verified instead.
    Decoy,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("decoy_hash", &"***")
            .finish_non_exhaustive()
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordError::Hash)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        let hash = hasher.hash("p1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("p1", &hash));
        assert!(!hasher.verify("p2", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        let first = hasher.hash("password").unwrap();
        let second = hasher.hash("password").unwrap();
        assert_ne!(first, second);
        assert!(hasher.verify("password", &first));
        assert!(hasher.verify("password", &second));
    }

    #[test]
    fn malformed_hash_is_false_not_error() {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        assert!(!hasher.verify("anything", "not-a-phc-string"));
        assert!(!hasher.verify("", ""));
    }

    #[test]
    fn federated_sentinel_never_verifies() {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        assert!(PasswordHash::new(FEDERATED_ONLY_HASH).is_err());
        assert!(!hasher.verify("", FEDERATED_ONLY_HASH));
        assert!(!hasher.verify(FEDERATED_ONLY_HASH, FEDERATED_ONLY_HASH));
        // A real hash is always PHC-shaped, never the sentinel.
        assert_ne!(hasher.hash("").unwrap(), FEDERATED_ONLY_HASH);
    }

    #[test]
    fn hashes_verify_across_cost_settings() {
        let fast = PasswordHasher::insecure_fast().unwrap();
        let hash = fast.hash("portable").unwrap();
        let default = PasswordHasher::new().unwrap();
        assert!(default.verify("portable", &hash));
    }

    #[test]
    fn unparseable_hash_costs_a_decoy_verification() {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        let hash = hasher.hash("p1").unwrap();
        assert_eq!(hasher.check("p1", FEDERATED_ONLY_HASH), Check::Decoy);
        assert_eq!(hasher.check("p1", "not-a-phc-string"), Check::Decoy);
        assert_eq!(hasher.check("p2", &hash), Check::Mismatched);
        assert_eq!(hasher.check("p1", &hash), Check::Matched);
    }

    #[test]
    fn decoy_is_always_false() {
        let hasher = PasswordHasher::insecure_fast().unwrap();
        assert!(!hasher.verify_decoy("whatever"));
    }
}
