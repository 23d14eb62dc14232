use std::{fs, path::Path};

use rand::{rngs::OsRng, RngCore};
use tracing::debug;

use crate::error::SecurityError;

/// Length of the key-derivation salt in bytes.
pub const SALT_LEN: usize = 32;

/// Read the installation salt, creating it on first use.
///
/// The salt is written once per installation and reused forever after;
/// key derivation stays deterministic across restarts only because of
/// that reuse. A file of the wrong length is reported as corruption,
/// never silently regenerated or padded.
pub fn ensure_salt(path: &Path) -> Result<[u8; SALT_LEN], SecurityError> {
    if path.exists() {
        let bytes = fs::read(path).map_err(|source| SecurityError::SaltIo {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.len() != SALT_LEN {
            return Err(SecurityError::SaltCorrupted {
                path: path.to_path_buf(),
                expected: SALT_LEN,
                found: bytes.len(),
            });
        }
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes);
        return Ok(salt);
    }

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SecurityError::SaltIo {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, salt).map_err(|source| SecurityError::SaltIo {
        path: path.to_path_buf(),
        source,
    })?;
    restrict_to_owner(path)?;

    debug!(path = %path.display(), "created key-derivation salt");
    Ok(salt)
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<(), SecurityError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| {
        SecurityError::SaltIo {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<(), SecurityError> {
    // Windows profile directories are already scoped to the owning user.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_salt_on_first_use() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("wes").join("salt");

        let salt = ensure_salt(&path).expect("salt creation should succeed");

        assert!(path.exists());
        assert_eq!(fs::read(&path).expect("read salt file"), salt);
        assert_ne!(salt, [0u8; SALT_LEN], "salt must be random, not zeroed");
    }

    #[test]
    fn reuses_existing_salt_byte_for_byte() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("salt");

        let first = ensure_salt(&path).expect("first ensure should succeed");
        let second = ensure_salt(&path).expect("second ensure should succeed");

        assert_eq!(first, second);
    }

    #[test]
    fn rejects_wrong_length_salt_as_corruption() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("salt");
        fs::write(&path, [7u8; 16]).expect("write short salt");

        let err = ensure_salt(&path).expect_err("short salt must be rejected");
        assert!(matches!(
            err,
            SecurityError::SaltCorrupted {
                expected: SALT_LEN,
                found: 16,
                ..
            }
        ));
        // The corrupt file must be left untouched for the operator to inspect.
        assert_eq!(fs::read(&path).expect("read salt file"), [7u8; 16]);
    }

    #[cfg(unix)]
    #[test]
    fn new_salt_is_owner_readable_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("salt");
        ensure_salt(&path).expect("salt creation should succeed");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
