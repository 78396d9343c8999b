//! AES-256-GCM encryption for sensitive document fields.
//!
//! Stored form: `enc:v1:` followed by base64 of `nonce (12 bytes) || ciphertext`.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};

use crate::errors::AppError;

const ENCRYPTED_PREFIX: &str = "enc:v1:";
const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldCipher")
    }
}

impl FieldCipher {
    /// Builds the cipher from a base64-encoded 32 byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, AppError> {
        let key_bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::InternalError(format!("Invalid base64 key: {}", e)))?;

        if key_bytes.len() != 32 {
            return Err(AppError::InternalError(format!(
                "Key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        Ok(Self { cipher })
    }

    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(ENCRYPTED_PREFIX)
    }

    /// Encrypts with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| AppError::InternalError(format!("Field encryption failed: {}", e)))?;

        let mut output = nonce.to_vec();
        output.extend(ciphertext);

        Ok(format!("{}{}", ENCRYPTED_PREFIX, BASE64.encode(output)))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, AppError> {
        let encoded = stored.strip_prefix(ENCRYPTED_PREFIX).ok_or_else(|| {
            AppError::InternalError("Value is not an encrypted field".to_string())
        })?;

        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| AppError::InternalError(format!("Corrupt encrypted field: {}", e)))?;

        if bytes.len() <= NONCE_LEN {
            return Err(AppError::InternalError(
                "Corrupt encrypted field: too short".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| AppError::InternalError("Field decryption failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::InternalError(format!("Decrypted field is not UTF-8: {}", e)))
    }
}

/// Short SHA-256 fingerprint (16 hex chars) of a secret's plaintext.
pub fn fingerprint(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(16);
    digest
}

/// Generates a new random key, base64 encoded.
pub fn generate_key() -> String {
    BASE64.encode(Aes256Gcm::generate_key(&mut OsRng))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::from_base64_key(&generate_key()).unwrap()
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let cipher = cipher();
        let stored = cipher.encrypt("sk_live_abc123").unwrap();

        assert!(FieldCipher::is_encrypted(&stored));
        assert!(!stored.contains("sk_live_abc123"));
        assert_eq!(cipher.decrypt(&stored).unwrap(), "sk_live_abc123");
    }

    #[test]
    fn test_nonces_differ_per_encryption() {
        let cipher = cipher();
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let stored = cipher().encrypt("secret").unwrap();
        assert!(cipher().decrypt(&stored).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = cipher();
        let stored = cipher.encrypt("secret").unwrap();
        let mut bytes = BASE64
            .decode(stored.trim_start_matches(ENCRYPTED_PREFIX))
            .unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let tampered = format!("{}{}", ENCRYPTED_PREFIX, BASE64.encode(bytes));

        assert!(cipher.decrypt(&tampered).is_err());
        assert!(cipher.decrypt("plain text").is_err());
    }

    #[test]
    fn test_rejects_short_keys() {
        assert!(FieldCipher::from_base64_key(&BASE64.encode([1u8; 16])).is_err());
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
        assert_eq!(fingerprint("abc").len(), 16);
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(fingerprint("abc"), "ba7816bf8f01cfea");
    }
}
