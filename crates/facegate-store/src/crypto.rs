//! AES-256-GCM sealing of descriptor blobs.
//!
//! Sealed layout: 12-byte random nonce followed by ciphertext and tag. The
//! key is the SHA-256 digest of a configured passphrase.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("store key must not be empty")]
    EmptyKey,
    #[error("invalid AES-GCM key length")]
    InvalidKey,
    #[error("encryption failed")]
    Encrypt,
    #[error("sealed blob too short ({0} bytes)")]
    Truncated(usize),
    #[error("decryption failed: wrong key or corrupted data")]
    Decrypt,
}

#[derive(Clone)]
pub struct DescriptorCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for DescriptorCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DescriptorCipher(..)")
    }
}

impl DescriptorCipher {
    pub fn from_passphrase(passphrase: &str) -> Result<Self, CryptoError> {
        if passphrase.is_empty() {
            return Err(CryptoError::EmptyKey);
        }
        let key = Sha256::digest(passphrase.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { cipher })
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < NONCE_LEN {
            return Err(CryptoError::Truncated(sealed.len()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_then_open() {
        let cipher = DescriptorCipher::from_passphrase("hunter2").unwrap();
        let sealed = cipher.seal(b"descriptor bytes").unwrap();
        assert_ne!(&sealed[NONCE_LEN..], b"descriptor bytes");
        assert_eq!(cipher.open(&sealed).unwrap(), b"descriptor bytes");
    }

    #[test]
    fn test_nonce_differs_per_seal() {
        let cipher = DescriptorCipher::from_passphrase("hunter2").unwrap();
        let a = cipher.seal(b"same").unwrap();
        let b = cipher.seal(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = DescriptorCipher::from_passphrase("right")
            .unwrap()
            .seal(b"secret")
            .unwrap();
        let err = DescriptorCipher::from_passphrase("wrong")
            .unwrap()
            .open(&sealed)
            .unwrap_err();
        assert_eq!(err, CryptoError::Decrypt);
    }

    #[test]
    fn test_truncated_and_empty_key() {
        let cipher = DescriptorCipher::from_passphrase("k").unwrap();
        assert_eq!(cipher.open(&[0u8; 4]).unwrap_err(), CryptoError::Truncated(4));
        assert_eq!(
            DescriptorCipher::from_passphrase("").unwrap_err(),
            CryptoError::EmptyKey
        );
    }
}
