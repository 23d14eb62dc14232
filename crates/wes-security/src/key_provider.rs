use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use wes_core::secrets::{SecretStore, SecretStoreError};

use crate::{error::SecurityError, salt::SALT_LEN};

/// Keyring account that holds the base64-encoded master key.
pub const MASTER_KEY_ACCOUNT: &str = "master_key";

/// PBKDF2 iteration count used for the password fallback and for the
/// working-key derivation in the cipher suite.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// 256-bit symmetric master key. Held only in memory; the bytes are
/// wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; 32],
}

impl MasterKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Fresh random key from the OS CSPRNG.
    pub(crate) fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Deterministic key derived from a password and the installation
    /// salt. Used when no OS secret store is available.
    pub(crate) fn from_password(password: &str, salt: &[u8; SALT_LEN]) -> Self {
        let mut bytes = [0u8; 32];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut bytes);
        Self { bytes }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key bytes must never reach logs.
        f.write_str("MasterKey(..)")
    }
}

/// How the live master key was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Loaded from (or freshly written to) the OS secret store.
    SecretStore,
    /// Derived from a caller-supplied password because no secret store
    /// was usable.
    Password,
}

/// Obtain the process master key.
///
/// Prefers the OS secret store: an existing key is decoded and returned,
/// otherwise a fresh random key is generated and persisted so the same
/// key comes back on every subsequent start. When the secret store is
/// unusable the key is derived from `master_password` instead; with no
/// password to fall back on this fails.
pub fn get_or_create_master_key(
    store: &dyn SecretStore,
    keyring_service: &str,
    salt: &[u8; SALT_LEN],
    master_password: Option<&str>,
) -> Result<(MasterKey, KeySource), SecurityError> {
    match store.get_secret(keyring_service, MASTER_KEY_ACCOUNT) {
        Ok(Some(encoded)) => Ok((decode_master_key(&encoded)?, KeySource::SecretStore)),
        Ok(None) => {
            let key = MasterKey::random();
            match store.set_secret(keyring_service, MASTER_KEY_ACCOUNT, &encode_master_key(&key)) {
                Ok(()) => {
                    debug!("created master key in secret store");
                    Ok((key, KeySource::SecretStore))
                }
                Err(err) => password_fallback(salt, master_password, err),
            }
        }
        Err(err) => password_fallback(salt, master_password, err),
    }
}

pub(crate) fn encode_master_key(key: &MasterKey) -> String {
    STANDARD.encode(key.as_bytes())
}

fn decode_master_key(encoded: &str) -> Result<MasterKey, SecurityError> {
    let mut decoded =
        STANDARD
            .decode(encoded)
            .map_err(|err| SecurityError::MalformedMasterKey {
                reason: err.to_string(),
            })?;
    if decoded.len() != 32 {
        decoded.zeroize();
        return Err(SecurityError::MalformedMasterKey {
            reason: format!("expected 32 bytes, got {}", decoded.len()),
        });
    }

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&decoded);
    decoded.zeroize();
    Ok(MasterKey { bytes })
}

fn password_fallback(
    salt: &[u8; SALT_LEN],
    master_password: Option<&str>,
    cause: SecretStoreError,
) -> Result<(MasterKey, KeySource), SecurityError> {
    match master_password {
        Some(password) => {
            warn!(%cause, "secret store unusable, deriving master key from password");
            Ok((MasterKey::from_password(password, salt), KeySource::Password))
        }
        None => Err(SecurityError::NoKeySource {
            reason: cause.to_string(),
        }),
    }
}
