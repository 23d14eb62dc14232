use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{
    error::SecurityError,
    key_provider::{MasterKey, PBKDF2_ITERATIONS},
    salt::SALT_LEN,
};

/// Version tag prefixed to every token this suite produces.
const TOKEN_PREFIX: &str = "wes.v1.";

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// AES-256-GCM suite keyed by PBKDF2-HMAC-SHA256(master key, salt).
/// Derivation happens once per manager lifetime; the working key is
/// wiped as soon as the cipher object owns it.
pub struct CipherSuite {
    cipher: Aes256Gcm,
}

impl CipherSuite {
    pub fn derive(master_key: &MasterKey, salt: &[u8; SALT_LEN]) -> Result<Self, SecurityError> {
        let mut derived = [0u8; 32];
        pbkdf2_hmac::<Sha256>(master_key.as_bytes(), salt, PBKDF2_ITERATIONS, &mut derived);

        let cipher =
            Aes256Gcm::new_from_slice(&derived).map_err(|err| SecurityError::Initialization {
                reason: format!("cipher construction failed: {err}"),
            })?;
        derived.zeroize();
        Ok(Self { cipher })
    }

    /// Encrypt a credential into a self-contained token
    /// (`wes.v1.<nonce>.<ciphertext+tag>`, URL-safe base64).
    ///
    /// A fresh nonce is drawn per call, so identical plaintexts never
    /// produce identical tokens.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, SecurityError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|err| SecurityError::Encrypt {
                reason: err.to_string(),
            })?;

        Ok(format!(
            "{TOKEN_PREFIX}{}.{}",
            URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            URL_SAFE_NO_PAD.encode(&ciphertext),
        ))
    }

    /// Decrypt a token produced by `encrypt`.
    ///
    /// Malformed input, a foreign key, or a failed authentication check
    /// all collapse into `SecurityError::Decrypt`; no partial plaintext
    /// is ever returned.
    pub fn decrypt(&self, token: &str) -> Result<String, SecurityError> {
        let (nonce_bytes, ciphertext) = parse_token(token).ok_or(SecurityError::Decrypt)?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| SecurityError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| SecurityError::Decrypt)
    }
}

fn parse_token(token: &str) -> Option<([u8; NONCE_LEN], Vec<u8>)> {
    let rest = token.strip_prefix(TOKEN_PREFIX)?;
    let (nonce_part, ciphertext_part) = rest.split_once('.')?;

    let nonce_bytes = URL_SAFE_NO_PAD.decode(nonce_part).ok()?;
    let nonce: [u8; NONCE_LEN] = nonce_bytes.try_into().ok()?;
    let ciphertext = URL_SAFE_NO_PAD.decode(ciphertext_part).ok()?;
    Some((nonce, ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite_with(seed: u8) -> CipherSuite {
        let master_key = MasterKey::from_password(&format!("seed-{seed}"), &[seed; SALT_LEN]);
        CipherSuite::derive(&master_key, &[seed; SALT_LEN]).expect("derive")
    }

    #[test]
    fn round_trips_plain_unicode_and_long_strings() {
        let suite = suite_with(1);
        let cases = [
            "".to_string(),
            "tok-abcdef123456".to_string(),
            "pässwörd-ünïcode-密码-🔑".to_string(),
            "x".repeat(64 * 1024),
        ];

        for plaintext in cases {
            let token = suite.encrypt(&plaintext).expect("encrypt");
            assert_ne!(token, plaintext);
            assert!(token.starts_with("wes.v1."));
            let decrypted = suite.decrypt(&token).expect("decrypt");
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn same_plaintext_encrypts_to_different_tokens() {
        let suite = suite_with(1);

        let first = suite.encrypt("tok-abcdef123456").expect("encrypt");
        let second = suite.encrypt("tok-abcdef123456").expect("encrypt");

        assert_ne!(first, second, "nonce must be fresh per call");
        assert_eq!(suite.decrypt(&first).expect("decrypt"), "tok-abcdef123456");
        assert_eq!(suite.decrypt(&second).expect("decrypt"), "tok-abcdef123456");
    }

    #[test]
    fn rejects_malformed_tokens() {
        let suite = suite_with(1);

        for bogus in [
            "",
            "garbage",
            "wes.v1.",
            "wes.v1.only-one-part",
            "wes.v1.!!!.###",
            "wes.v2.AAAA.AAAA",
        ] {
            let err = suite.decrypt(bogus).expect_err("malformed token must fail");
            assert!(matches!(err, SecurityError::Decrypt));
        }
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let suite = suite_with(1);
        let token = suite.encrypt("secret").expect("encrypt");

        // Flip the last character of the ciphertext segment.
        let mut tampered = token.clone();
        let last = tampered.pop().expect("non-empty token");
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        let err = suite.decrypt(&tampered).expect_err("tampering must be detected");
        assert!(matches!(err, SecurityError::Decrypt));
    }

    #[test]
    fn rejects_tokens_from_a_different_key() {
        let ours = suite_with(1);
        let theirs = suite_with(2);

        let token = theirs.encrypt("secret").expect("encrypt");
        let err = ours.decrypt(&token).expect_err("foreign token must fail");
        assert!(matches!(err, SecurityError::Decrypt));
    }

    #[test]
    fn derivation_is_deterministic_per_master_key_and_salt() {
        let a = suite_with(3);
        let b = suite_with(3);

        let token = a.encrypt("shared").expect("encrypt");
        assert_eq!(b.decrypt(&token).expect("decrypt"), "shared");
    }
}
