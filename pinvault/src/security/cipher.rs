//! AES-256-GCM encryption of vault payloads.
//!
//! Persisted format: `[12-byte IV][ciphertext with 16-byte auth tag]`.
//! Every failure on the decrypt side collapses into
//! [`VaultError::DecryptionFailed`]: a wrong key and tampered bytes look the
//! same to the caller.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use super::kdf::VaultKey;
use crate::error::{VaultError, VaultResult};

/// IV size for AES-GCM (96 bits = 12 bytes)
pub const IV_SIZE: usize = 12;

/// GCM authentication tag size.
pub const TAG_SIZE: usize = 16;

/// An IV plus the authenticated ciphertext it was produced with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    iv: [u8; IV_SIZE],
    ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serialize as `[iv][ciphertext]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(IV_SIZE + self.ciphertext.len());
        output.extend_from_slice(&self.iv);
        output.extend_from_slice(&self.ciphertext);
        output
    }

    /// Parse the `[iv][ciphertext]` format.
    ///
    /// A blob that cannot hold an IV and a tag is corrupted, which is
    /// reported the same way as any other decryption failure.
    pub fn from_bytes(bytes: &[u8]) -> VaultResult<Self> {
        if bytes.len() < IV_SIZE + TAG_SIZE {
            return Err(VaultError::DecryptionFailed);
        }

        let (iv_bytes, ciphertext) = bytes.split_at(IV_SIZE);
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(iv_bytes);

        Ok(Self {
            iv,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Encrypt `plaintext` under `key` with a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &VaultKey) -> VaultResult<EncryptedPayload> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Encryption(format!("Invalid key: {}", e)))?;

    let mut iv = [0u8; IV_SIZE];
    rand::rng().fill_bytes(&mut iv);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| VaultError::Encryption(format!("Encryption failed: {}", e)))?;

    Ok(EncryptedPayload { iv, ciphertext })
}

/// Decrypt and authenticate `payload` with `key`.
pub fn decrypt(payload: &EncryptedPayload, key: &VaultKey) -> VaultResult<Zeroizing<Vec<u8>>> {
    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| VaultError::DecryptionFailed)?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&payload.iv), payload.ciphertext.as_ref())
        .map_err(|_| VaultError::DecryptionFailed)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::kdf::KEY_LEN;

    fn key(byte: u8) -> VaultKey {
        VaultKey::from_bytes([byte; KEY_LEN])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let k = key(7);
        let payload = encrypt(b"sk-abc", &k).unwrap();
        let plaintext = decrypt(&payload, &k).unwrap();
        assert_eq!(plaintext.as_slice(), b"sk-abc");
    }

    #[test]
    fn test_iv_is_fresh_per_encryption() {
        let k = key(7);
        let a = encrypt(b"same plaintext", &k).unwrap();
        let b = encrypt(b"same plaintext", &k).unwrap();

        assert_ne!(a.iv(), b.iv());
        assert_ne!(a.to_bytes(), b.to_bytes());
        assert_eq!(decrypt(&a, &k).unwrap(), decrypt(&b, &k).unwrap());
    }

    #[test]
    fn test_ciphertext_includes_tag() {
        let payload = encrypt(b"12345", &key(1)).unwrap();
        assert_eq!(payload.ciphertext().len(), 5 + TAG_SIZE);
    }

    #[test]
    fn test_wrong_key_fails() {
        let payload = encrypt(b"secret", &key(1)).unwrap();
        assert!(matches!(
            decrypt(&payload, &key(2)),
            Err(VaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let k = key(1);
        let mut bytes = encrypt(b"secret", &k).unwrap().to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let tampered = EncryptedPayload::from_bytes(&bytes).unwrap();
        assert!(matches!(
            decrypt(&tampered, &k),
            Err(VaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_iv_fails() {
        let k = key(1);
        let mut bytes = encrypt(b"secret", &k).unwrap().to_bytes();
        bytes[0] ^= 0x80;

        let tampered = EncryptedPayload::from_bytes(&bytes).unwrap();
        assert!(decrypt(&tampered, &k).is_err());
    }

    #[test]
    fn test_wire_format_roundtrip() {
        let payload = encrypt(b"x", &key(4)).unwrap();
        let parsed = EncryptedPayload::from_bytes(&payload.to_bytes()).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_truncated_blob_is_decryption_failure() {
        assert!(matches!(
            EncryptedPayload::from_bytes(&[0u8; IV_SIZE + TAG_SIZE - 1]),
            Err(VaultError::DecryptionFailed)
        ));
    }
}
