//! Scrypt-backed password and bearer-secret hashing.
//!
//! Two parameter sets are used, per `SPEC_FULL.md` §4.1:
//! - `N = 2^14, r = 8, p = 1` for user passwords, where the input is
//!   low-entropy and must be made expensive to brute-force.
//! - `N = 2^5, r = 8, p = 1` for bearer secrets (user tokens, share
//!   tokens): the secret is already 32 random bytes, so a lighter cost
//!   factor is enough to avoid a fast offline dictionary attack on a
//!   stolen hash without slowing every authenticated request down.

use rand::RngCore;
use scrypt::Params;
use subtle::ConstantTimeEq;

const OUTPUT_LEN: usize = 32;
const SALT_LEN: usize = 16;

const PASSWORD_LOG_N: u8 = 14;
const SECRET_LOG_N: u8 = 5;
const R: u32 = 8;
const P: u32 = 1;

/// A salt/hash pair produced by [`hash_password`] or [`hash_secret`], ready
/// to be persisted alongside the owning row.
#[derive(Debug, Clone)]
pub struct PasswordHash {
    /// Random salt used for this hash.
    pub salt: Vec<u8>,
    /// Scrypt digest of the input under `salt`.
    pub hash: Vec<u8>,
}

fn random_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

fn scrypt_digest(input: &str, salt: &[u8], log_n: u8) -> Vec<u8> {
    let params = Params::new(log_n, R, P, OUTPUT_LEN)
        .expect("fixed scrypt parameters are always valid");
    let mut output = vec![0u8; OUTPUT_LEN];
    scrypt::scrypt(input.as_bytes(), salt, &params, &mut output)
        .expect("fixed output length matches OUTPUT_LEN");
    output
}

/// Hash a user-chosen password with the expensive parameter set.
#[must_use]
pub fn hash_password(password: &str) -> PasswordHash {
    let salt = random_salt();
    let hash = scrypt_digest(password, &salt, PASSWORD_LOG_N);
    PasswordHash { salt, hash }
}

/// Verify a candidate password against a stored salt/hash, in constant time.
#[must_use]
pub fn verify_password(password: &str, salt: &[u8], hash: &[u8]) -> bool {
    let candidate = scrypt_digest(password, salt, PASSWORD_LOG_N);
    candidate.ct_eq(hash).into()
}

/// Hash an already-high-entropy bearer secret with the light parameter set.
#[must_use]
pub fn hash_secret(secret: &str) -> PasswordHash {
    let salt = random_salt();
    let hash = scrypt_digest(secret, &salt, SECRET_LOG_N);
    PasswordHash { salt, hash }
}

/// Verify a candidate bearer secret against a stored salt/hash, in constant time.
#[must_use]
pub fn verify_secret(secret: &str, salt: &[u8], hash: &[u8]) -> bool {
    let candidate = scrypt_digest(secret, salt, SECRET_LOG_N);
    candidate.ct_eq(hash).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trips() {
        let h = hash_password("hunter22");
        assert!(verify_password("hunter22", &h.salt, &h.hash));
        assert!(!verify_password("wrong", &h.salt, &h.hash));
    }

    #[test]
    fn secret_round_trips() {
        let h = hash_secret("a-very-random-32-byte-token");
        assert!(verify_secret("a-very-random-32-byte-token", &h.salt, &h.hash));
        assert!(!verify_secret("forged", &h.salt, &h.hash));
    }

    #[test]
    fn different_salts_produce_different_hashes() {
        let a = hash_password("same-password");
        let b = hash_password("same-password");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }
}
