use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use wes_core::secrets::SecretStore;

use crate::{cipher::CipherSuite, error::SecurityError};

/// Keyring account holding the (non-secret) index of stored credentials.
const INDEX_ACCOUNT: &str = "credential_index";

/// Identifier for one stored credential. Carries no secret material and
/// is safe to log or display.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CredentialId {
    pub service: String,
    pub username: String,
}

impl CredentialId {
    pub fn new(service: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            username: username.into(),
        }
    }

    /// Composite keyring account for this credential.
    fn account(&self) -> String {
        format!("{}_{}", self.service, self.username)
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.username)
    }
}

/// Encrypted credential storage on top of a `SecretStore`.
///
/// OS keyrings cannot enumerate their entries, so the store keeps a
/// JSON index (identifiers only, never values) in the same secret
/// store; `list` and key rotation read it.
pub struct CredentialStore<S: SecretStore> {
    backend: S,
    keyring_service: String,
}

impl<S: SecretStore> CredentialStore<S> {
    pub fn new(backend: S, keyring_service: impl Into<String>) -> Self {
        Self {
            backend,
            keyring_service: keyring_service.into(),
        }
    }

    pub(crate) fn backend(&self) -> &S {
        &self.backend
    }

    /// Encrypt and persist a credential, overwriting any existing entry.
    #[instrument(skip_all, fields(service, username))]
    pub fn store(
        &self,
        cipher: &CipherSuite,
        service: &str,
        username: &str,
        plaintext: &str,
    ) -> Result<(), SecurityError> {
        let id = CredentialId::new(service, username);
        let token = cipher.encrypt(plaintext)?;
        self.backend
            .set_secret(&self.keyring_service, &id.account(), &token)?;

        let mut index = self.read_index()?;
        if index.insert(id) {
            self.write_index(&index)?;
        }
        debug!(service, username, "credential stored");
        Ok(())
    }

    /// Fetch and decrypt a credential. `Ok(None)` means no credential is
    /// configured; a present-but-undecryptable entry is an error.
    #[instrument(skip_all, fields(service, username))]
    pub fn retrieve(
        &self,
        cipher: &CipherSuite,
        service: &str,
        username: &str,
    ) -> Result<Option<String>, SecurityError> {
        let id = CredentialId::new(service, username);
        match self
            .backend
            .get_secret(&self.keyring_service, &id.account())?
        {
            Some(token) => Ok(Some(cipher.decrypt(&token)?)),
            None => Ok(None),
        }
    }

    /// Remove a credential; deleting an absent entry succeeds.
    #[instrument(skip_all, fields(service, username))]
    pub fn delete(&self, service: &str, username: &str) -> Result<(), SecurityError> {
        let id = CredentialId::new(service, username);
        self.backend
            .delete_secret(&self.keyring_service, &id.account())?;

        let mut index = self.read_index()?;
        if index.remove(&id) {
            self.write_index(&index)?;
        }
        debug!(service, username, "credential deleted");
        Ok(())
    }

    /// Known credential identifiers. Never includes secret values.
    pub fn list(&self) -> Result<BTreeSet<CredentialId>, SecurityError> {
        self.read_index()
    }

    /// Raw stored token for an indexed entry (rotation support).
    pub(crate) fn raw_token(&self, id: &CredentialId) -> Result<Option<String>, SecurityError> {
        Ok(self
            .backend
            .get_secret(&self.keyring_service, &id.account())?)
    }

    /// Overwrite the stored token for an existing entry.
    pub(crate) fn write_token(&self, id: &CredentialId, token: &str) -> Result<(), SecurityError> {
        Ok(self
            .backend
            .set_secret(&self.keyring_service, &id.account(), token)?)
    }

    fn read_index(&self) -> Result<BTreeSet<CredentialId>, SecurityError> {
        match self
            .backend
            .get_secret(&self.keyring_service, INDEX_ACCOUNT)?
        {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|err| SecurityError::IndexCorrupted {
                    reason: err.to_string(),
                })
            }
            None => Ok(BTreeSet::new()),
        }
    }

    fn write_index(&self, index: &BTreeSet<CredentialId>) -> Result<(), SecurityError> {
        let raw = serde_json::to_string(index).map_err(|err| SecurityError::IndexCorrupted {
            reason: err.to_string(),
        })?;
        Ok(self
            .backend
            .set_secret(&self.keyring_service, INDEX_ACCOUNT, &raw)?)
    }
}
