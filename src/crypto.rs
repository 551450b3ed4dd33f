//! Encryption and HMAC capabilities used by the session serializer.
//!
//! - [`AesGcmEncryptionProvider`]: AES-256-GCM, output `base64(nonce || ciphertext)`
//! - [`HmacSha256Provider`]: 32-byte HMAC-SHA256 tags
//!
//! Both keys are derived from one secret with domain-separated SHA-256.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::SessionError;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;

/// Symmetric encryption of string payloads.
pub trait EncryptionProvider: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, SessionError>;

    /// Returns `None` when the ciphertext can't be decrypted under this key.
    fn decrypt(&self, ciphertext: &str) -> Option<String>;
}

/// Fixed-length authentication tags.
pub trait HmacProvider: Send + Sync {
    /// Tag length in bytes.
    fn hmac_length(&self) -> usize;

    fn generate_hmac(&self, data: &[u8]) -> Vec<u8>;
}

pub struct AesGcmEncryptionProvider {
    cipher: Aes256Gcm,
}

impl AesGcmEncryptionProvider {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    pub fn from_secret(secret: &str) -> Self {
        Self::new(&derive_key("encryption", secret))
    }
}

impl EncryptionProvider for AesGcmEncryptionProvider {
    fn encrypt(&self, plaintext: &str) -> Result<String, SessionError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| SessionError::Serialization(format!("encryption failed: {e}")))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(&combined))
    }

    fn decrypt(&self, ciphertext: &str) -> Option<String> {
        let combined = STANDARD.decode(ciphertext).ok()?;
        if combined.len() < NONCE_LEN {
            return None;
        }
        let (nonce_bytes, encrypted) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), encrypted)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}

pub struct HmacSha256Provider {
    key: Vec<u8>,
}

impl HmacSha256Provider {
    pub fn new(key: &[u8]) -> Self {
        Self { key: key.to_vec() }
    }

    pub fn from_secret(secret: &str) -> Self {
        Self::new(&derive_key("hmac", secret))
    }
}

impl HmacProvider for HmacSha256Provider {
    fn hmac_length(&self) -> usize {
        32
    }

    fn generate_hmac(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .expect("HMAC key length is always valid");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

/// The provider pair an encrypted serializer needs.
#[derive(Clone)]
pub struct CryptoConfig {
    pub encryption: Arc<dyn EncryptionProvider>,
    pub hmac: Arc<dyn HmacProvider>,
}

impl CryptoConfig {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encryption: Arc::new(AesGcmEncryptionProvider::from_secret(secret)),
            hmac: Arc::new(HmacSha256Provider::from_secret(secret)),
        }
    }
}

/// Constant-time comparison of the first `length` bytes of two tags.
///
/// Tags shorter than `length` never match.
pub fn hmac_matches(expected: &[u8], actual: &[u8], length: usize) -> bool {
    if expected.len() < length || actual.len() < length {
        return false;
    }
    expected[..length].ct_eq(&actual[..length]).into()
}

/// Length of the padded base64 encoding of `byte_len` bytes.
pub fn base64_len(byte_len: usize) -> usize {
    byte_len.div_ceil(3) * 4
}

fn derive_key(purpose: &str, secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(purpose.as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let provider = AesGcmEncryptionProvider::from_secret("secret");
        let ciphertext = provider.encrypt("key=value;").unwrap();
        assert_ne!(ciphertext, "key=value;");
        assert_eq!(provider.decrypt(&ciphertext).as_deref(), Some("key=value;"));
    }

    #[test]
    fn test_encryption_is_randomized() {
        let provider = AesGcmEncryptionProvider::from_secret("secret");
        let a = provider.encrypt("same").unwrap();
        let b = provider.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_with_wrong_key() {
        let a = AesGcmEncryptionProvider::from_secret("secret-a");
        let b = AesGcmEncryptionProvider::from_secret("secret-b");
        let ciphertext = a.encrypt("data").unwrap();
        assert_eq!(b.decrypt(&ciphertext), None);
    }

    #[test]
    fn test_decrypt_garbage() {
        let provider = AesGcmEncryptionProvider::from_secret("secret");
        assert_eq!(provider.decrypt("!!!not base64!!!"), None);
        assert_eq!(provider.decrypt("AAAA"), None);
    }

    #[test]
    fn test_hmac_length_and_determinism() {
        let provider = HmacSha256Provider::from_secret("secret");
        let a = provider.generate_hmac(b"payload");
        let b = provider.generate_hmac(b"payload");
        assert_eq!(a.len(), provider.hmac_length());
        assert_eq!(a, b);
        assert_ne!(a, provider.generate_hmac(b"payload2"));
    }

    #[test]
    fn test_derived_keys_differ_per_purpose() {
        assert_ne!(derive_key("encryption", "s"), derive_key("hmac", "s"));
    }

    #[test]
    fn test_hmac_matches() {
        let tag = [7u8; 32];
        let mut other = tag;
        assert!(hmac_matches(&tag, &other, 32));
        other[31] ^= 1;
        assert!(!hmac_matches(&tag, &other, 32));
        assert!(!hmac_matches(&tag, &other[..16], 32));
    }

    #[test]
    fn test_base64_len() {
        assert_eq!(base64_len(32), 44);
        assert_eq!(base64_len(20), 28);
        assert_eq!(base64_len(3), 4);
        assert_eq!(base64_len(32), STANDARD.encode([0u8; 32]).len());
    }
}
