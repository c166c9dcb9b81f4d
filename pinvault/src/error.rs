//! Vault error types.
//!
//! The variants map onto the outcomes the host UI has to tell apart:
//! - input problems the user can correct (`InvalidPinFormat`)
//! - a failed unlock (`DecryptionFailed`, normally folded into `VerifyResult`)
//! - storage trouble that must never cost the user an attempt
//! - the terminal self-destruct outcome

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The PIN is too short, too long, or contains non-digit characters.
    /// Rejected before any cryptographic work is done.
    #[error("Invalid PIN format: {0}")]
    InvalidPinFormat(String),

    /// Wrong PIN or corrupted ciphertext. The two are deliberately
    /// indistinguishable.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// The secret store could not be read or written.
    /// Never counted as a failed attempt.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The failed-attempt threshold was reached and the vault data is gone.
    /// The host must run a fresh setup.
    #[error("Vault self-destructed after too many failed attempts")]
    SelfDestructTriggered,

    /// No encrypted secret has been stored yet.
    #[error("Vault not set up")]
    NotSetup,

    /// The vault configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encrypting the secret failed.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// A serialization/deserialization error occurred outside the
    /// encrypted payload (metadata, attempt state, config).
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A background task failed to complete.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for vault operations.
pub type VaultResult<T> = std::result::Result<T, VaultError>;

impl From<StoreError> for VaultError {
    fn from(err: StoreError) -> Self {
        VaultError::StorageUnavailable(err.to_string())
    }
}

impl VaultError {
    /// Stable error code for programmatic handling on the host side.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::InvalidPinFormat(_) => "INVALID_PIN_FORMAT",
            VaultError::DecryptionFailed => "DECRYPTION_FAILED",
            VaultError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            VaultError::SelfDestructTriggered => "SELF_DESTRUCT_TRIGGERED",
            VaultError::NotSetup => "NOT_SETUP",
            VaultError::Config(_) => "CONFIG_ERROR",
            VaultError::Encryption(_) => "ENCRYPTION_ERROR",
            VaultError::Serialization(_) => "SERIALIZATION_ERROR",
            VaultError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

// ============================================================================
// Serialization for the host UI bridge
// ============================================================================

impl serde::Serialize for VaultError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("VaultError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_maps_to_storage_unavailable() {
        let err: VaultError = StoreError::Unavailable("disk full".into()).into();
        assert!(matches!(err, VaultError::StorageUnavailable(ref m) if m.contains("disk full")));
    }

    #[test]
    fn test_vault_error_serialization() {
        let err = VaultError::InvalidPinFormat("PIN must contain only digits".into());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("INVALID_PIN_FORMAT"));
        assert!(json.contains("only digits"));
    }

    #[test]
    fn test_decryption_failed_message_is_generic() {
        assert_eq!(VaultError::DecryptionFailed.to_string(), "Decryption failed");
    }
}
