//! PIN-gated local credential vault.
//!
//! Keeps one small secret record (API key and related fields) encrypted at
//! rest under a key derived from a 4-6 digit PIN. Repeated wrong PINs wipe
//! the vault, and a successful unlock opens a session that auto-locks after
//! a configurable idle period.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pinvault::{FileStore, PinVault, VaultConfig, VaultSecret};
//!
//! # async fn run() -> pinvault::VaultResult<()> {
//! let store = Arc::new(FileStore::open("/var/lib/myapp/vault").await?);
//! let vault = PinVault::open(store, VaultConfig::default()).await?;
//!
//! if !vault.has_secret().await? {
//!     let secret = VaultSecret::new().with_field("apiKey", "sk-abc");
//!     vault.setup("1234", &secret).await?;
//! }
//!
//! let result = vault.verify("1234").await?;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod security;
pub mod store;
pub mod vault;

pub use config::{load_config, save_config, SaltMode, VaultConfig};
pub use error::{VaultError, VaultResult};
pub use store::{FileStore, MemoryStore, SecretStore, StoreError};
pub use vault::{
    PinVault, SessionManager, VaultMetadata, VaultSecret, VaultStatus, VerifyResult, WipeReport,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default tracing subscriber.
///
/// Honors `RUST_LOG`; falls back to `pinvault=debug`. Safe to call more than
/// once, later calls are ignored.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pinvault=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
