//! PIN-to-key derivation with PBKDF2-HMAC-SHA256.
//!
//! There is no stored PIN hash. Verification works because derivation is
//! deterministic: the same `(pin, salt, iterations)` always yields the same
//! key, and only that key opens the stored ciphertext.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{VaultError, VaultResult};

/// Length of the derived key (256 bits for AES-256).
pub const KEY_LEN: usize = 32;

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Lowest iteration count accepted by the vault configuration.
pub const MIN_ITERATIONS: u32 = 1_000;

/// A 256-bit encryption key with automatic zeroization on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; KEY_LEN],
}

impl VaultKey {
    pub fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Get the key as a byte slice for cryptographic operations.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the actual key material
        f.debug_struct("VaultKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive an encryption key from a PIN.
///
/// Cannot fail. Rejecting empty or malformed PINs is the caller's job.
pub fn derive_key(pin: &str, salt: &[u8], iterations: u32) -> VaultKey {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), salt, iterations, &mut key);
    let derived = VaultKey::from_bytes(key);
    key.zeroize();
    derived
}

/// Run [`derive_key`] on the blocking thread pool.
///
/// PBKDF2 at production cost takes long enough to stall an async executor,
/// so vault operations always derive through this wrapper.
pub async fn derive_key_blocking(
    pin: Zeroizing<String>,
    salt: Vec<u8>,
    iterations: u32,
) -> VaultResult<VaultKey> {
    let key = tokio::task::spawn_blocking(move || derive_key(&pin, &salt, iterations))
        .await
        .map_err(|e| VaultError::Internal(format!("Key derivation task failed: {}", e)))?;

    debug!(
        "Derived {}-byte key ({} PBKDF2 iterations)",
        KEY_LEN, iterations
    );
    Ok(key)
}
