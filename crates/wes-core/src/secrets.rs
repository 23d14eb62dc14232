use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use thiserror::Error;

/// Errors produced by secret-store backends.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretStoreError {
    /// The platform has no usable secret storage (missing daemon, locked
    /// keychain, denied session bus, ...).
    #[error("secret store unavailable: {reason}")]
    Unavailable { reason: String },
    /// Underlying backend failure.
    #[error("secret store failure: {reason}")]
    Backend { reason: String },
}

/// Contract for OS-level secret storage keyed by (service, account)
/// pairs. Production uses the OS keyring; tests substitute in-memory
/// doubles so no suite ever touches a real keychain.
pub trait SecretStore: Send + Sync {
    /// Fetch the secret stored for an account; `None` when nothing is
    /// stored, which callers treat as a normal state rather than an error.
    fn get_secret(&self, service: &str, account: &str)
        -> Result<Option<String>, SecretStoreError>;

    /// Persist a secret, overwriting any existing value.
    fn set_secret(&self, service: &str, account: &str, value: &str)
        -> Result<(), SecretStoreError>;

    /// Remove an account's secret (idempotent).
    fn delete_secret(&self, service: &str, account: &str) -> Result<(), SecretStoreError>;
}

/// In-memory secret store for tests and ephemeral sessions. Values are
/// held verbatim; callers are expected to hand it ciphertext, never
/// plaintext secrets.
#[derive(Debug, Default, Clone)]
pub struct InMemorySecretStore {
    inner: Arc<Mutex<HashMap<(String, String), String>>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for InMemorySecretStore {
    fn get_secret(
        &self,
        service: &str,
        account: &str,
    ) -> Result<Option<String>, SecretStoreError> {
        let map = self.inner.lock().map_err(|err| SecretStoreError::Backend {
            reason: format!("lock poisoned: {err}"),
        })?;
        Ok(map.get(&(service.to_string(), account.to_string())).cloned())
    }

    fn set_secret(
        &self,
        service: &str,
        account: &str,
        value: &str,
    ) -> Result<(), SecretStoreError> {
        let mut map = self.inner.lock().map_err(|err| SecretStoreError::Backend {
            reason: format!("lock poisoned: {err}"),
        })?;
        map.insert((service.to_string(), account.to_string()), value.to_string());
        Ok(())
    }

    fn delete_secret(&self, service: &str, account: &str) -> Result<(), SecretStoreError> {
        let mut map = self.inner.lock().map_err(|err| SecretStoreError::Backend {
            reason: format!("lock poisoned: {err}"),
        })?;
        map.remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}
