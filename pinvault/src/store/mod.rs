//! Durable key/value storage used by the vault.
//!
//! The vault only relies on the get/put/delete contract of [`SecretStore`].
//! Two implementations ship with the crate:
//! - [`MemoryStore`]: process-lifetime map, used by tests and ephemeral hosts
//! - [`FileStore`]: one file per key inside an application data directory

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

/// Store key holding the sealed record (salt, IV and ciphertext).
pub const PAYLOAD_KEY: &str = "vault.payload";

/// Store key holding plaintext metadata about the encrypted secret.
pub const METADATA_KEY: &str = "vault.meta";

/// Store key holding the "PIN last set" timestamp (display/audit only).
pub const PIN_SET_AT_KEY: &str = "vault.pin_set_at";

/// Store key holding the persisted failed-attempt counter.
pub const ATTEMPTS_KEY: &str = "vault.attempts";

/// Errors raised by a [`SecretStore`] implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An I/O error occurred (file access, permissions, quota, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing store is temporarily or permanently unreachable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable key/value map the vault reads and writes.
///
/// Implementations must treat `delete` of an absent key as a successful
/// no-op; the self-destruct path relies on that to stay idempotent.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
