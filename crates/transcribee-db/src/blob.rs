//! Media blob storage (component C3, minus byte-serving — see
//! `SPEC_FULL.md` §4.2 Non-goals).
//!
//! Workers and clients exchange signed URLs, never raw filesystem paths.
//! The signature is an HMAC-SHA1 over a small JSON envelope, matching the
//! shape the original implementation signs, with an age check on verify.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use std::path::{Path, PathBuf};

use crate::error::DbError;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Serialize, Deserialize)]
struct SignaturePayload {
    file: String,
    timestamp: i64,
}

/// Mints and checks signed URLs, and moves bytes in and out of storage.
///
/// `sign`/`verify` are pure functions of `secret_key`; `put`/`delete` touch
/// the filesystem. Split out so a future object-store backend only needs
/// to implement the latter two.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` under `file`, the logical file id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    async fn put(&self, file: &str, bytes: &[u8]) -> Result<(), DbError>;

    /// Remove the blob named `file`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the removal fails for a reason other than
    /// the file already being absent.
    async fn delete(&self, file: &str) -> Result<(), DbError>;
}

/// Sign `file` with `secret_key`, stamping the current time.
#[must_use]
pub fn sign(secret_key: &str, file: &str) -> String {
    sign_at(secret_key, file, Utc::now().timestamp())
}

fn sign_at(secret_key: &str, file: &str, timestamp: i64) -> String {
    let payload = SignaturePayload {
        file: file.to_string(),
        timestamp,
    };
    let json = serde_json::to_vec(&payload).expect("signature payload always serializes");
    let encoded = URL_SAFE_NO_PAD.encode(&json);

    let mut mac =
        HmacSha1::new_from_slice(secret_key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(encoded.as_bytes());
    let tag = mac.finalize().into_bytes();

    format!("{encoded}.{}", URL_SAFE_NO_PAD.encode(tag))
}

/// Check that `signature` is a valid, unexpired signature over `file`.
///
/// Returns `false` for a malformed signature, a signature over a different
/// file, a forged tag, or one older than `max_age_secs`.
#[must_use]
pub fn verify(secret_key: &str, file: &str, signature: &str, max_age_secs: i64) -> bool {
    let Some((encoded, tag_b64)) = signature.split_once('.') else {
        return false;
    };
    let Ok(expected_tag) = URL_SAFE_NO_PAD.decode(tag_b64) else {
        return false;
    };
    let Ok(mut mac) = HmacSha1::new_from_slice(secret_key.as_bytes()) else {
        return false;
    };
    mac.update(encoded.as_bytes());
    if mac.verify_slice(&expected_tag).is_err() {
        return false;
    }

    let Ok(json) = URL_SAFE_NO_PAD.decode(encoded) else {
        return false;
    };
    let Ok(payload) = serde_json::from_slice::<SignaturePayload>(&json) else {
        return false;
    };
    if payload.file != file {
        return false;
    }

    let age = Utc::now().timestamp() - payload.timestamp;
    age >= 0 && age <= max_age_secs
}

/// [`BlobStore`] backed by a directory on the local filesystem.
pub struct LocalFsBlobStore {
    root: PathBuf,
}

impl LocalFsBlobStore {
    /// Use `root` as the storage directory. Does not create it; callers
    /// should ensure it exists before serving traffic.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalFsBlobStore {
    async fn put(&self, file: &str, bytes: &[u8]) -> Result<(), DbError> {
        let path = self.path_for(file);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DbError::Migration(format!("creating {parent:?}: {e}")))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| DbError::Migration(format!("writing {path:?}: {e}")))
    }

    async fn delete(&self, file: &str) -> Result<(), DbError> {
        match tokio::fs::remove_file(self.path_for(file)).await {
            Ok(()) | Err(_) if !self.path_for(file).exists() => Ok(()),
            Err(e) => Err(DbError::Migration(format!("deleting {file}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trips() {
        let sig = sign_at("s3cr3t", "abc123", 1_000);
        assert!(verify("s3cr3t", "abc123", &sig, 60));
    }

    #[test]
    fn signature_rejects_wrong_secret() {
        let sig = sign_at("s3cr3t", "abc123", 1_000);
        assert!(!verify("other", "abc123", &sig, 60));
    }

    #[test]
    fn signature_rejects_wrong_file() {
        let sig = sign_at("s3cr3t", "abc123", 1_000);
        assert!(!verify("s3cr3t", "xyz999", &sig, 60));
    }

    #[test]
    fn signature_rejects_tampered_tag() {
        let mut sig = sign_at("s3cr3t", "abc123", 1_000);
        sig.push('x');
        assert!(!verify("s3cr3t", "abc123", &sig, 60));
    }

    #[test]
    fn signature_expires() {
        let now = Utc::now().timestamp();
        let sig = sign_at("s3cr3t", "abc123", now - 120);
        assert!(!verify("s3cr3t", "abc123", &sig, 60));
        assert!(verify("s3cr3t", "abc123", &sig, 300));
    }

    #[tokio::test]
    async fn local_fs_round_trips_put_and_delete() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalFsBlobStore::new(dir.path());
        store.put("file1", b"hello").await.expect("put");
        let read = tokio::fs::read(dir.path().join("file1")).await.expect("read");
        assert_eq!(read, b"hello");
        store.delete("file1").await.expect("delete");
        assert!(!dir.path().join("file1").exists());
    }

    #[tokio::test]
    async fn local_fs_delete_of_missing_file_is_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalFsBlobStore::new(dir.path());
        store.delete("nonexistent").await.expect("delete of absent file is not an error");
    }
}
