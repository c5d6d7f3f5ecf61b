//! Who is calling: local accounts, password hashing, session tokens, Google
//! Sign-In, and bearer-token resolution.

mod accounts;
pub mod google;
mod models;
pub mod password;
mod resolver;
pub mod token;

pub use accounts::{valid_email, AccountError, Accounts};
pub use google::{AssertionError, FederatedIdentity, GoogleVerifier};
pub use models::User;
pub use password::{PasswordHasher, FEDERATED_ONLY_HASH};
pub use resolver::{IdentityResolver, ResolveError};
pub use token::{TokenError, TokenService};
