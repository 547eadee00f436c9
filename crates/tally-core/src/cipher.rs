//! Authenticated encryption of provider API tokens.
//!
//! Tokens are sealed with AES-256-GCM under one process-wide key. The stored
//! form is `base64(nonce ‖ tag ‖ ciphertext)` with a fresh 96-bit nonce per
//! call. The key is only parsed on first use, so a process without a key can
//! start and serve requests that never touch a token.

use std::fmt;
use std::sync::OnceLock;

use aes_gcm::Aes256Gcm;
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, Nonce, OsRng, Tag};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Environment variable named in [`CipherError::MissingKey`].
pub const KEY_ENV: &str = "TALLY_ENCRYPTION_KEY";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Cipher errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// No key was configured.
    #[error("encryption key is not configured (set {KEY_ENV})")]
    MissingKey,
    /// The configured key is not 32 hex-encoded bytes.
    #[error("encryption key must be {KEY_LEN} bytes encoded as {} hex characters", KEY_LEN * 2)]
    InvalidKey,
    /// Sealing failed.
    #[error("failed to encrypt token")]
    Encrypt,
    /// The stored blob is malformed, was tampered with, or was sealed under another key.
    #[error("stored token could not be decrypted")]
    Decrypt,
}

impl CipherError {
    /// Whether the error comes from configuration rather than stored data.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingKey | Self::InvalidKey)
    }
}

/// A sealed token in its storage encoding.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedToken(String);

impl EncryptedToken {
    /// Wraps a value previously produced by [`Cipher::encrypt`] and read back from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EncryptedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncryptedToken")
            .field(&format_args!("{} bytes", self.0.len()))
            .finish()
    }
}

/// Token cipher shared by every connection.
pub struct Cipher {
    hex_key: Option<String>,
    aead: OnceLock<Aes256Gcm>,
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher")
            .field("key", &"[REDACTED]")
            .field("initialized", &self.aead.get().is_some())
            .finish()
    }
}

impl Cipher {
    /// Creates a cipher from a hex-encoded key taken from configuration.
    ///
    /// The key is not validated here; a missing or malformed key surfaces as
    /// an error from the first [`encrypt`](Self::encrypt) or
    /// [`decrypt`](Self::decrypt) call.
    pub fn new(hex_key: Option<String>) -> Self {
        Self {
            hex_key,
            aead: OnceLock::new(),
        }
    }

    fn aead(&self) -> Result<&Aes256Gcm, CipherError> {
        if let Some(aead) = self.aead.get() {
            return Ok(aead);
        }
        let hex_key = self
            .hex_key
            .as_deref()
            .ok_or(CipherError::MissingKey)?
            .trim();
        if hex_key.is_empty() {
            return Err(CipherError::MissingKey);
        }
        let key = hex::decode(hex_key).map_err(|_| CipherError::InvalidKey)?;
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKey);
        }
        let aead = Aes256Gcm::new_from_slice(&key).map_err(|_| CipherError::InvalidKey)?;
        Ok(self.aead.get_or_init(|| aead))
    }

    /// Seals a plaintext token.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedToken, CipherError> {
        let aead = self.aead()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = aead
            .encrypt_in_place_detached(&nonce, b"", &mut buffer)
            .map_err(|_| CipherError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + TAG_LEN + buffer.len());
        blob.extend_from_slice(nonce.as_slice());
        blob.extend_from_slice(tag.as_slice());
        blob.extend_from_slice(&buffer);
        Ok(EncryptedToken(STANDARD.encode(blob)))
    }

    /// Opens a sealed token.
    ///
    /// Fails with [`CipherError::Decrypt`] unless the authentication tag
    /// verifies; partial or altered plaintext is never returned.
    pub fn decrypt(&self, token: &EncryptedToken) -> Result<String, CipherError> {
        let aead = self.aead()?;
        let blob = STANDARD
            .decode(token.as_str())
            .map_err(|_| CipherError::Decrypt)?;
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Decrypt);
        }
        let (nonce, rest) = blob.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let mut buffer = ciphertext.to_vec();
        aead.decrypt_in_place_detached(
            Nonce::<Aes256Gcm>::from_slice(nonce),
            b"",
            &mut buffer,
            Tag::<Aes256Gcm>::from_slice(tag),
        )
        .map_err(|_| CipherError::Decrypt)?;
        String::from_utf8(buffer).map_err(|_| CipherError::Decrypt)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TEST_KEY: &str =
        "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
    const OTHER_KEY: &str = "ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100";

    pub(crate) fn test_cipher() -> Cipher {
        Cipher::new(Some(TEST_KEY.to_string()))
    }

    #[test]
    fn round_trips_plaintext() {
        let cipher = test_cipher();
        for plaintext in ["", "a", "1971a5e2f0c4b1d0e9c8", "päss wörd ✓"] {
            let sealed = cipher.encrypt(plaintext).unwrap();
            assert_eq!(cipher.decrypt(&sealed).unwrap(), plaintext);
        }
    }

    #[test]
    fn encrypting_twice_uses_fresh_nonces() {
        let cipher = test_cipher();
        let first = cipher.encrypt("token").unwrap();
        let second = cipher.encrypt("token").unwrap();
        assert_ne!(first, second);
        assert_eq!(cipher.decrypt(&first).unwrap(), "token");
        assert_eq!(cipher.decrypt(&second).unwrap(), "token");
    }

    #[test]
    fn stored_layout_is_nonce_tag_ciphertext() {
        let sealed = test_cipher().encrypt("abcd").unwrap();
        let blob = STANDARD.decode(sealed.as_str()).unwrap();
        assert_eq!(blob.len(), NONCE_LEN + TAG_LEN + 4);
    }

    #[test]
    fn any_flipped_bit_fails_decryption() {
        let cipher = test_cipher();
        let sealed = cipher.encrypt("secret-token").unwrap();
        let blob = STANDARD.decode(sealed.as_str()).unwrap();
        for index in 0..blob.len() {
            for bit in 0..8 {
                let mut tampered = blob.clone();
                tampered[index] ^= 1 << bit;
                let tampered = EncryptedToken::from_stored(STANDARD.encode(&tampered));
                assert_eq!(
                    cipher.decrypt(&tampered),
                    Err(CipherError::Decrypt),
                    "byte {index} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn truncated_or_garbage_blob_fails() {
        let cipher = test_cipher();
        let short = EncryptedToken::from_stored(STANDARD.encode([0_u8; NONCE_LEN + TAG_LEN - 1]));
        assert_eq!(cipher.decrypt(&short), Err(CipherError::Decrypt));
        let garbage = EncryptedToken::from_stored("not base64!");
        assert_eq!(cipher.decrypt(&garbage), Err(CipherError::Decrypt));
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let sealed = test_cipher().encrypt("token").unwrap();
        let other = Cipher::new(Some(OTHER_KEY.to_string()));
        assert_eq!(other.decrypt(&sealed), Err(CipherError::Decrypt));
    }

    #[test]
    fn missing_key_fails_first_call_not_construction() {
        let cipher = Cipher::new(None);
        let err = cipher.encrypt("token").unwrap_err();
        assert_eq!(err, CipherError::MissingKey);
        assert!(err.is_configuration());
        let err = cipher
            .decrypt(&EncryptedToken::from_stored("AAAA"))
            .unwrap_err();
        assert_eq!(err, CipherError::MissingKey);
    }

    #[test]
    fn malformed_key_is_a_configuration_error() {
        let too_long = "ab".repeat(33);
        for key in ["zz", "0011", too_long.as_str()] {
            let cipher = Cipher::new(Some(key.to_string()));
            assert_eq!(cipher.encrypt("token"), Err(CipherError::InvalidKey));
        }
    }

    #[test]
    fn debug_redacts_key() {
        let debug = format!("{:?}", test_cipher());
        assert!(!debug.contains(TEST_KEY));
        assert!(debug.contains("[REDACTED]"));
    }
}
