//! Credential parsing failures.
//!
//! The two-way split here (unauthorized vs. bad-request) mirrors
//! `SPEC_FULL.md` §4.1: a missing/unrecognized scheme is `Unauthorized`,
//! while malformed encoding of an otherwise-recognized scheme is
//! `BadRequest`. `transcribee-server::error` maps these to status codes;
//! this crate only classifies.

/// Why a bearer-style credential (`Scheme <payload>`) failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// Header had no `<scheme> <payload>` split (no space).
    #[error("credential header has no scheme separator")]
    NoScheme,
    /// The scheme name did not match what the endpoint expects.
    #[error("unrecognized credential scheme")]
    WrongScheme,
    /// The payload was not valid base64.
    #[error("credential payload is not valid base64")]
    InvalidBase64,
    /// The decoded payload was not valid UTF-8.
    #[error("credential payload is not valid UTF-8")]
    InvalidUtf8,
    /// The decoded payload had no `id:secret` delimiter.
    #[error("credential payload has no id/secret delimiter")]
    MissingDelimiter,
    /// The `id` half of the payload was not a UUID.
    #[error("credential id is not a valid UUID")]
    InvalidId,
}
