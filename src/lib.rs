//! # Chartkeeper (Patient Records API)
//!
//! `chartkeeper` is the backend for a clinical patient-record application. It
//! authenticates clinicians and serves their patient records together with an
//! append-only audit trail per record.
//!
//! ## Authentication
//!
//! - **Password login:** Argon2id hashes, OAuth2 password-grant form at
//!   `/api/v1/auth/login`.
//! - **Google Sign-In:** Google ID tokens are verified offline against Google's
//!   cached JWKS. A first login provisions a federated-only account whose
//!   stored hash can never match a password.
//! - **Sessions:** both paths issue the same HS256 bearer token (subject email,
//!   absolute expiry, no refresh).
//!
//! ## Ownership
//!
//! Every patient record has exactly one owner. Reads and writes are filtered on
//! the owner, and a record owned by someone else returns `404 Not Found`, the
//! same response as a record that does not exist, so ids cannot be enumerated.
//!
//! ## Storage
//!
//! PostgreSQL (`postgres://`) in production; an in-memory store (`memory://`)
//! for local development and tests. List endpoints return at most 1000 items.

pub mod api;
pub mod cli;
pub mod identity;
pub mod records;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
