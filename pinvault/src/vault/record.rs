//! The stored payload record.
//!
//! Layout: `[version][salt_len][salt][iv][ciphertext + tag]`.
//!
//! The salt lives in the same store value as the ciphertext, so one `put`
//! replaces both and a failed write leaves the previous record intact. A
//! `salt_len` of zero means the record was sealed with the legacy static
//! salt.

use super::salt::{KdfSalt, SALT_SIZE};
use crate::error::{VaultError, VaultResult};
use crate::security::EncryptedPayload;

/// Current record format version.
pub const RECORD_VERSION: u8 = 1;

/// Version byte plus salt length byte.
const HEADER_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedRecord {
    salt: KdfSalt,
    payload: EncryptedPayload,
}

impl SealedRecord {
    pub fn new(salt: KdfSalt, payload: EncryptedPayload) -> Self {
        Self { salt, payload }
    }

    pub fn salt(&self) -> &KdfSalt {
        &self.salt
    }

    pub fn payload(&self) -> &EncryptedPayload {
        &self.payload
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let payload = self.payload.to_bytes();
        let salt: &[u8] = match &self.salt {
            KdfSalt::PerInstallation(salt) => salt,
            KdfSalt::LegacyStatic => &[],
        };

        let mut output = Vec::with_capacity(HEADER_LEN + salt.len() + payload.len());
        output.push(RECORD_VERSION);
        output.push(salt.len() as u8);
        output.extend_from_slice(salt);
        output.extend_from_slice(&payload);
        output
    }

    /// Parse a stored record.
    ///
    /// A record of the wrong shape is damaged, and damage is reported the
    /// same way as a wrong PIN.
    pub fn from_bytes(bytes: &[u8]) -> VaultResult<Self> {
        let [version, salt_len, rest @ ..] = bytes else {
            return Err(VaultError::DecryptionFailed);
        };
        if *version != RECORD_VERSION {
            return Err(VaultError::DecryptionFailed);
        }

        let (salt, payload) = match usize::from(*salt_len) {
            0 => (KdfSalt::LegacyStatic, rest),
            SALT_SIZE if rest.len() >= SALT_SIZE => {
                let (salt_bytes, payload) = rest.split_at(SALT_SIZE);
                let mut salt = [0u8; SALT_SIZE];
                salt.copy_from_slice(salt_bytes);
                (KdfSalt::PerInstallation(salt), payload)
            }
            _ => return Err(VaultError::DecryptionFailed),
        };

        Ok(Self {
            salt,
            payload: EncryptedPayload::from_bytes(payload)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SaltMode;
    use crate::security::{encrypt, VaultKey, KEY_LEN};

    fn sealed(mode: SaltMode) -> SealedRecord {
        let key = VaultKey::from_bytes([5u8; KEY_LEN]);
        SealedRecord::new(KdfSalt::generate(mode), encrypt(b"secret", &key).unwrap())
    }

    #[test]
    fn test_record_carries_salt() {
        let record = sealed(SaltMode::PerInstallation);
        let bytes = record.to_bytes();
        assert_eq!(bytes[0], RECORD_VERSION);
        assert_eq!(usize::from(bytes[1]), SALT_SIZE);
        assert_eq!(&bytes[2..2 + SALT_SIZE], record.salt().as_bytes());

        assert_eq!(SealedRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn test_legacy_record_has_no_salt_bytes() {
        let record = sealed(SaltMode::LegacyStatic);
        let bytes = record.to_bytes();
        assert_eq!(bytes[1], 0);

        let parsed = SealedRecord::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.salt(), &KdfSalt::LegacyStatic);
    }

    #[test]
    fn test_malformed_records_are_decryption_failures() {
        let good = sealed(SaltMode::PerInstallation).to_bytes();

        let mut wrong_version = good.clone();
        wrong_version[0] = 9;
        let mut odd_salt = good.clone();
        odd_salt[1] = 7;

        for bytes in [
            vec![],
            vec![RECORD_VERSION],
            wrong_version,
            odd_salt,
            good[..HEADER_LEN + SALT_SIZE + 4].to_vec(),
        ] {
            assert!(matches!(
                SealedRecord::from_bytes(&bytes),
                Err(VaultError::DecryptionFailed)
            ));
        }
    }
}
