//! PIN-protected vault for a single secret record.
//!
//! This module provides:
//! - Encryption of the secret under a key derived from a short numeric PIN
//! - A persisted failed-attempt counter with a self-destruct wipe
//! - An in-memory auto-lock session
//!
//! The PIN is run through PBKDF2-HMAC-SHA256 with a per-installation salt,
//! and the resulting key seals the secret with AES-256-GCM. Salt and
//! ciphertext are stored together as one record.

pub mod auth;
pub mod lockout;
pub mod manager;
pub mod record;
pub mod salt;
pub mod secret;
pub mod session;

pub use auth::{VaultMetadata, VaultStatus, VerifyResult};
pub use lockout::{wipe_scope, AttemptState, FailureOutcome, LockoutPolicy, LockoutState, WipeReport};
pub use manager::PinVault;
pub use record::SealedRecord;
pub use salt::{KdfSalt, LEGACY_STATIC_SALT, SALT_SIZE};
pub use secret::{VaultSecret, PROVIDER_FIELD};
pub use session::{Clock, SessionManager, SessionState, SystemClock};
