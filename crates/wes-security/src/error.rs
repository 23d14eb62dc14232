use std::path::PathBuf;

use thiserror::Error;
use wes_core::secrets::SecretStoreError;

/// Failures inside the credential security core.
///
/// Absence of a credential is deliberately not represented here:
/// `retrieve_credential` returns `Ok(None)` for "not configured" and
/// reserves errors for corruption and missing capability.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Cipher construction or key derivation failed during setup.
    #[error("failed to initialize encryption: {reason}")]
    Initialization { reason: String },

    /// An operation was attempted before (or after) the cipher suite
    /// was live.
    #[error("encryption not initialized")]
    NotInitialized,

    /// The salt file exists but does not hold exactly the expected
    /// number of bytes. Never repaired automatically: regenerating the
    /// salt would invalidate every existing ciphertext.
    #[error("salt file {path} is corrupted: expected {expected} bytes, found {found}")]
    SaltCorrupted {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    /// The salt file could not be read or written.
    #[error("salt file {path} is inaccessible")]
    SaltIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OS secret store is unusable and no master password was
    /// supplied to fall back on.
    #[error("no secure key storage available and no fallback password provided: {reason}")]
    NoKeySource { reason: String },

    /// The master key retrieved from the secret store does not decode
    /// to 32 raw bytes.
    #[error("stored master key is malformed: {reason}")]
    MalformedMasterKey { reason: String },

    /// AEAD encryption failed.
    #[error("failed to encrypt credential: {reason}")]
    Encrypt { reason: String },

    /// The token is malformed, was produced under a different key, or
    /// failed its authentication check. No partial plaintext escapes.
    #[error("failed to decrypt credential")]
    Decrypt,

    /// The credential index entry could not be parsed.
    #[error("credential index corrupted: {reason}")]
    IndexCorrupted { reason: String },

    /// Secret-store backend failure.
    #[error(transparent)]
    Store(#[from] SecretStoreError),

    /// Key rotation stopped partway: `rotated` entries are readable
    /// under the new key, `pending` entries still require the old one.
    #[error(
        "master key rotation incomplete ({} rotated, {} pending): {reason}",
        rotated.len(),
        pending.len()
    )]
    RotationIncomplete {
        rotated: Vec<String>,
        pending: Vec<String>,
        reason: String,
    },
}
