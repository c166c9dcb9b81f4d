//! Status and result types returned to the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::secret::VaultSecret;
use crate::error::{VaultError, VaultResult};

/// Represents the current state of the vault.
///
/// - `NotSetup` → `Unlocked` (after setup)
/// - `Unlocked` → `Locked` (manual lock or auto-lock timeout)
/// - `Locked` → `Unlocked` (successful verify)
/// - `Locked` → `Destroyed` (failed-attempt threshold reached)
/// - `Destroyed` → `Unlocked` (fresh setup)
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum VaultStatus {
    #[default]
    NotSetup,
    Locked,
    Unlocked,
    Destroyed,
}

impl std::fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSetup => write!(f, "NotSetup"),
            Self::Locked => write!(f, "Locked"),
            Self::Unlocked => write!(f, "Unlocked"),
            Self::Destroyed => write!(f, "Destroyed"),
        }
    }
}

/// Outcome of a PIN verification.
///
/// A wrong PIN is an expected outcome and is reported here rather than as an
/// error. When `should_self_destruct` is set the host must treat every piece
/// of secret state as gone and restart its setup flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<VaultSecret>,
    pub attempts_remaining: u32,
    pub should_self_destruct: bool,
}

impl VerifyResult {
    pub(crate) fn unlocked(secret: VaultSecret, attempts_remaining: u32) -> Self {
        Self {
            success: true,
            secret: Some(secret),
            attempts_remaining,
            should_self_destruct: false,
        }
    }

    pub(crate) fn rejected(attempts_remaining: u32) -> Self {
        Self {
            success: false,
            secret: None,
            attempts_remaining,
            should_self_destruct: false,
        }
    }

    pub(crate) fn destroyed() -> Self {
        Self {
            success: false,
            secret: None,
            attempts_remaining: 0,
            should_self_destruct: true,
        }
    }

    /// Turn the result into the secret, or the matching error.
    pub fn into_secret(self) -> VaultResult<VaultSecret> {
        if self.should_self_destruct {
            return Err(VaultError::SelfDestructTriggered);
        }
        self.secret.ok_or(VaultError::DecryptionFailed)
    }
}

/// Plaintext metadata stored next to the ciphertext.
///
/// Not confidentiality-sensitive; lets the host show which provider is
/// configured without unlocking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultMetadata {
    pub provider: Option<String>,
    pub updated_at: DateTime<Utc>,
}
