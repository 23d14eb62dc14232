use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use tracing::{info, instrument};
use zeroize::{Zeroize, Zeroizing};

use wes_core::secrets::SecretStore;

use crate::{
    cipher::CipherSuite,
    credential_store::{CredentialId, CredentialStore},
    error::SecurityError,
    key_provider::{self, KeySource, MasterKey, MASTER_KEY_ACCOUNT},
    keyring_store::KeyringSecretStore,
    salt::{self, SALT_LEN},
};

/// Default service name under which all keyring entries are filed.
pub const DEFAULT_KEYRING_SERVICE: &str = "wes";

/// Sentinel round-tripped by `validate_integrity`.
const INTEGRITY_SENTINEL: &str = "wes-integrity-probe";

/// Outcome of a completed master key rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationReport {
    /// Identifiers of the entries re-encrypted under the new key.
    pub rotated: Vec<String>,
}

/// Facade over salt, master key, cipher suite, and credential storage.
///
/// One instance per process, constructed once at startup and passed to
/// consumers; there are no hidden globals. Instances are not internally
/// locked: concurrent `rotate_master_key` calls from two instances over
/// the same backing store are unsafe and must be serialized by the
/// caller.
pub struct SecurityManager<S: SecretStore> {
    salt: [u8; SALT_LEN],
    cipher: Option<CipherSuite>,
    credentials: CredentialStore<S>,
    keyring_service: String,
    key_source: KeySource,
}

impl<S: SecretStore> std::fmt::Debug for SecurityManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityManager")
            .field("salt", &"<redacted>")
            .field("cipher", &self.cipher.as_ref().map(|_| "<redacted>"))
            .field("keyring_service", &self.keyring_service)
            .field("key_source", &self.key_source)
            .finish_non_exhaustive()
    }
}

impl SecurityManager<KeyringSecretStore> {
    /// Construct against the OS keyring and the default salt location
    /// (`<config-dir>/wes/salt`).
    pub fn new(master_password: Option<&str>) -> Result<Self, SecurityError> {
        Self::with_backend(
            default_salt_path()?,
            KeyringSecretStore,
            DEFAULT_KEYRING_SERVICE,
            master_password,
        )
    }
}

impl<S: SecretStore> SecurityManager<S> {
    /// Construct with an explicit salt path and secret-store backend,
    /// wiring salt -> master key -> cipher -> credential store in that
    /// order and failing fast if any stage cannot complete.
    pub fn with_backend(
        salt_path: impl AsRef<Path>,
        backend: S,
        keyring_service: impl Into<String>,
        master_password: Option<&str>,
    ) -> Result<Self, SecurityError> {
        let keyring_service = keyring_service.into();
        let salt = salt::ensure_salt(salt_path.as_ref())?;
        let (master_key, key_source) = key_provider::get_or_create_master_key(
            &backend,
            &keyring_service,
            &salt,
            master_password,
        )?;
        let cipher = CipherSuite::derive(&master_key, &salt)?;
        info!(service = %keyring_service, source = ?key_source, "encryption initialized");

        Ok(Self {
            salt,
            cipher: Some(cipher),
            credentials: CredentialStore::new(backend, keyring_service.clone()),
            keyring_service,
            key_source,
        })
    }

    fn cipher(&self) -> Result<&CipherSuite, SecurityError> {
        self.cipher.as_ref().ok_or(SecurityError::NotInitialized)
    }

    /// Encrypt an arbitrary credential string into an opaque token.
    pub fn encrypt_credential(&self, plaintext: &str) -> Result<String, SecurityError> {
        self.cipher()?.encrypt(plaintext)
    }

    /// Decrypt a token produced by `encrypt_credential`.
    pub fn decrypt_credential(&self, token: &str) -> Result<String, SecurityError> {
        self.cipher()?.decrypt(token)
    }

    /// Encrypt and persist a credential under (service, username).
    pub fn store_credential(
        &self,
        service: &str,
        username: &str,
        value: &str,
    ) -> Result<(), SecurityError> {
        self.credentials.store(self.cipher()?, service, username, value)
    }

    /// Fetch and decrypt a credential; `Ok(None)` when none is configured.
    pub fn retrieve_credential(
        &self,
        service: &str,
        username: &str,
    ) -> Result<Option<String>, SecurityError> {
        self.credentials.retrieve(self.cipher()?, service, username)
    }

    /// Remove a credential; removing an absent entry succeeds.
    pub fn delete_credential(&self, service: &str, username: &str) -> Result<(), SecurityError> {
        self.credentials.delete(service, username)
    }

    /// Identifiers of all stored credentials (no secret values).
    pub fn list_stored_credentials(&self) -> Result<BTreeSet<CredentialId>, SecurityError> {
        self.credentials.list()
    }

    /// Health check: true iff the cipher suite is live and a sentinel
    /// string survives an encrypt/decrypt round trip. Failures are
    /// reported as `false`, never as an error.
    pub fn validate_integrity(&self) -> bool {
        let Some(cipher) = self.cipher.as_ref() else {
            return false;
        };
        match cipher
            .encrypt(INTEGRITY_SENTINEL)
            .and_then(|token| cipher.decrypt(&token))
        {
            Ok(plaintext) => plaintext == INTEGRITY_SENTINEL,
            Err(_) => false,
        }
    }

    /// Best-effort scrubbing of a sensitive string the caller is done
    /// with. A no-op for empty input; never fails.
    pub fn secure_delete(&self, value: Option<&mut String>) {
        if let Some(value) = value {
            if !value.is_empty() {
                value.zeroize();
            }
        }
    }

    /// Replace the master key with a fresh random one and re-encrypt
    /// every stored credential under it.
    ///
    /// Entries are first read back under the old key; if any is
    /// unreadable, rotation aborts before anything is rewritten. A
    /// write failure partway through yields
    /// `SecurityError::RotationIncomplete` naming the rotated and
    /// pending entries.
    #[instrument(skip_all)]
    pub fn rotate_master_key(&mut self) -> Result<RotationReport, SecurityError> {
        if self.key_source == KeySource::Password {
            return Err(SecurityError::Initialization {
                reason: "password-derived master key has no secret store to receive a new key; \
                         use rotate_master_key_with_password"
                    .to_string(),
            });
        }
        self.rotate_to(MasterKey::random(), true)
    }

    /// Rotate onto a key derived from a new master password. When a
    /// secret store is available the derived key is persisted there so
    /// later keyring-backed constructions keep working.
    #[instrument(skip_all)]
    pub fn rotate_master_key_with_password(
        &mut self,
        new_password: &str,
    ) -> Result<RotationReport, SecurityError> {
        let new_key = MasterKey::from_password(new_password, &self.salt);
        let persist = self.key_source == KeySource::SecretStore;
        self.rotate_to(new_key, persist)
    }

    fn rotate_to(
        &mut self,
        new_key: MasterKey,
        persist_key: bool,
    ) -> Result<RotationReport, SecurityError> {
        let old_cipher = self.cipher.as_ref().ok_or(SecurityError::NotInitialized)?;
        let ids: Vec<CredentialId> = self.credentials.list()?.into_iter().collect();

        // Read everything back under the old key before touching any
        // persistent state; an unreadable entry aborts rotation with
        // nothing rewritten.
        let mut plaintexts: Vec<Zeroizing<String>> = Vec::with_capacity(ids.len());
        for id in &ids {
            let token =
                self.credentials
                    .raw_token(id)?
                    .ok_or_else(|| SecurityError::IndexCorrupted {
                        reason: format!("indexed entry {id} missing from secret store"),
                    })?;
            plaintexts.push(Zeroizing::new(old_cipher.decrypt(&token)?));
        }

        let new_cipher = CipherSuite::derive(&new_key, &self.salt)?;
        if persist_key {
            self.credentials.backend().set_secret(
                &self.keyring_service,
                MASTER_KEY_ACCOUNT,
                &key_provider::encode_master_key(&new_key),
            )?;
        }

        // From here the new key is authoritative; rewrite each entry
        // and report the rotated/pending split if a write fails.
        let new_source = if persist_key {
            KeySource::SecretStore
        } else {
            KeySource::Password
        };
        let mut rotated: Vec<String> = Vec::with_capacity(ids.len());
        for (id, plaintext) in ids.iter().zip(plaintexts.iter()) {
            let write = new_cipher
                .encrypt(plaintext.as_str())
                .and_then(|token| self.credentials.write_token(id, &token));
            if let Err(err) = write {
                let pending = ids[rotated.len()..].iter().map(ToString::to_string).collect();
                self.cipher = Some(new_cipher);
                self.key_source = new_source;
                return Err(SecurityError::RotationIncomplete {
                    rotated,
                    pending,
                    reason: err.to_string(),
                });
            }
            rotated.push(id.to_string());
        }

        self.cipher = Some(new_cipher);
        self.key_source = new_source;
        info!(entries = rotated.len(), "master key rotated");
        Ok(RotationReport { rotated })
    }
}

fn default_salt_path() -> Result<PathBuf, SecurityError> {
    let base = dirs::config_dir().ok_or_else(|| SecurityError::Initialization {
        reason: "no config directory available for salt storage".to_string(),
    })?;
    Ok(base.join("wes").join("salt"))
}
