//! Wire encoding for user/share tokens, and verification for the two
//! credential kinds that are compared in cleartext (worker tokens, the
//! admin API token).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::CredentialError;

/// Generate a fresh 32-byte random secret, base64-encoded — the raw
/// high-entropy value handed to the client once and never stored directly
/// (only its scrypt hash is persisted).
#[must_use]
pub fn generate_secret() -> String {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    STANDARD.encode(raw)
}

/// Encode a user or share token for the wire: `base64("<id>:<secret>")`.
#[must_use]
pub fn encode_scoped_token(id: Uuid, secret: &str) -> String {
    STANDARD.encode(format!("{id}:{secret}"))
}

/// Decode a user or share token, returning the scoping id and the raw
/// secret to be verified against the stored hash via
/// [`crate::verify_secret`].
///
/// # Errors
///
/// Returns [`CredentialError::InvalidBase64`] if the payload isn't valid
/// base64, [`CredentialError::InvalidUtf8`] if it doesn't decode to UTF-8,
/// [`CredentialError::MissingDelimiter`] if there's no `:` separator, and
/// [`CredentialError::InvalidId`] if the id half isn't a UUID.
pub fn parse_scoped_token(token: &str) -> Result<(Uuid, String), CredentialError> {
    let decoded = STANDARD
        .decode(token)
        .map_err(|_| CredentialError::InvalidBase64)?;
    let decoded = String::from_utf8(decoded).map_err(|_| CredentialError::InvalidUtf8)?;
    let (id, secret) = decoded
        .split_once(':')
        .ok_or(CredentialError::MissingDelimiter)?;
    let id = id.parse::<Uuid>().map_err(|_| CredentialError::InvalidId)?;
    Ok((id, secret.to_string()))
}

/// Compare a presented worker token against the stored cleartext token in
/// constant time.
#[must_use]
pub fn verify_worker_token(presented: &str, stored: &str) -> bool {
    constant_time_str_eq(presented, stored)
}

/// Compare a presented `Api-Token` header against the configured admin
/// secret in constant time.
#[must_use]
pub fn verify_api_token(presented: &str, configured: &str) -> bool {
    constant_time_str_eq(presented, configured)
}

fn constant_time_str_eq(a: &str, b: &str) -> bool {
    // Constant-time only once lengths match; a length mismatch is not
    // secret-dependent information worth padding away.
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_token_round_trips() {
        let id = Uuid::new_v4();
        let secret = generate_secret();
        let wire = encode_scoped_token(id, &secret);
        let (decoded_id, decoded_secret) = parse_scoped_token(&wire).unwrap();
        assert_eq!(decoded_id, id);
        assert_eq!(decoded_secret, secret);
    }

    #[test]
    fn rejects_bad_base64() {
        assert_eq!(
            parse_scoped_token("not base64!!!").unwrap_err(),
            CredentialError::InvalidBase64
        );
    }

    #[test]
    fn rejects_missing_delimiter() {
        let payload = STANDARD.encode("no-delimiter-here");
        assert_eq!(
            parse_scoped_token(&payload).unwrap_err(),
            CredentialError::MissingDelimiter
        );
    }

    #[test]
    fn rejects_non_uuid_id() {
        let payload = STANDARD.encode("not-a-uuid:secret");
        assert_eq!(
            parse_scoped_token(&payload).unwrap_err(),
            CredentialError::InvalidId
        );
    }

    #[test]
    fn worker_token_compare() {
        assert!(verify_worker_token("abc", "abc"));
        assert!(!verify_worker_token("abc", "abd"));
        assert!(!verify_worker_token("abc", "abcd"));
    }
}
