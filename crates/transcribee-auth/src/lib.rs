//! Identity & Credentials (component C1).
//!
//! Pure cryptographic building blocks: no database access, no HTTP. Callers
//! (`transcribee-db` repositories, `transcribee-server` handlers) are
//! responsible for looking up the candidate rows and handing their
//! stored salt/hash to [`verify_secret`]/[`verify_password`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod password;
mod token;

pub use error::CredentialError;
pub use password::{hash_password, hash_secret, verify_password, verify_secret, PasswordHash};
pub use token::{
    encode_scoped_token, generate_secret, parse_scoped_token, verify_api_token, verify_worker_token,
};
