//! Salt handling for PIN key derivation.
//!
//! New vaults get a random 16-byte salt per installation. The salt is not
//! secret and travels inside the stored record next to the ciphertext it
//! was used for (see [`super::record`]). Records written in legacy mode
//! carry no salt and are read with the fixed application-wide salt.

use rand::RngCore;

use crate::config::SaltMode;

/// Salt size in bytes (128 bits)
pub const SALT_SIZE: usize = 16;

/// Application-wide salt shared by every installation in legacy mode.
pub const LEGACY_STATIC_SALT: &[u8] = b"personal-finance-vault-salt-v1";

/// Salt a payload was (or will be) sealed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KdfSalt {
    PerInstallation([u8; SALT_SIZE]),
    LegacyStatic,
}

impl KdfSalt {
    /// Pick the salt for a fresh setup or PIN change.
    pub fn generate(mode: SaltMode) -> Self {
        match mode {
            SaltMode::PerInstallation => {
                let mut salt = [0u8; SALT_SIZE];
                rand::rng().fill_bytes(&mut salt);
                KdfSalt::PerInstallation(salt)
            }
            SaltMode::LegacyStatic => KdfSalt::LegacyStatic,
        }
    }

    /// Bytes fed to the KDF.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            KdfSalt::PerInstallation(salt) => salt,
            KdfSalt::LegacyStatic => LEGACY_STATIC_SALT,
        }
    }
}
