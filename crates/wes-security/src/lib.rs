//! Credential security core: salt management, master key lifecycle,
//! authenticated encryption, and keyring-backed credential storage.
//!
//! The `SecurityManager` facade wires the pieces together; everything
//! below it is synchronous and holds no locks, so callers that share an
//! instance across threads must serialize access themselves.

pub mod cipher;
pub mod credential_store;
pub mod error;
pub mod key_provider;
pub mod keyring_store;
pub mod manager;
pub mod salt;

pub use credential_store::CredentialId;
pub use error::SecurityError;
pub use keyring_store::KeyringSecretStore;
pub use manager::{RotationReport, SecurityManager, DEFAULT_KEYRING_SERVICE};
