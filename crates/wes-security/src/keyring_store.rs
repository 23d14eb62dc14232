use keyring::Entry;

use wes_core::secrets::{SecretStore, SecretStoreError};

/// `SecretStore` backed by the OS keyring (Keychain, Credential
/// Manager, libsecret). Entries are opened per call; the keyring crate
/// keeps no useful state between operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringSecretStore;

impl KeyringSecretStore {
    fn entry(service: &str, account: &str) -> Result<Entry, SecretStoreError> {
        Entry::new(service, account).map_err(|err| SecretStoreError::Unavailable {
            reason: err.to_string(),
        })
    }
}

impl SecretStore for KeyringSecretStore {
    fn get_secret(
        &self,
        service: &str,
        account: &str,
    ) -> Result<Option<String>, SecretStoreError> {
        let entry = Self::entry(service, account)?;
        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(SecretStoreError::Backend {
                reason: err.to_string(),
            }),
        }
    }

    fn set_secret(
        &self,
        service: &str,
        account: &str,
        value: &str,
    ) -> Result<(), SecretStoreError> {
        Self::entry(service, account)?
            .set_password(value)
            .map_err(|err| SecretStoreError::Backend {
                reason: err.to_string(),
            })
    }

    fn delete_secret(&self, service: &str, account: &str) -> Result<(), SecretStoreError> {
        match Self::entry(service, account)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(SecretStoreError::Backend {
                reason: err.to_string(),
            }),
        }
    }
}
