//! PinVault - PIN-gated lifecycle of the encrypted secret.
//!
//! This module provides the PinVault struct that handles:
//! - First-time setup (encrypt and store the secret under a PIN-derived key)
//! - Verification (derive, decrypt, count failures, self-destruct)
//! - PIN change, manual lock and host-initiated wipe
//! - Status and plaintext metadata queries
//!
//! Every operation that touches the store runs under a single async mutex
//! around the lockout state. A verify is therefore one transaction, and a
//! wipe in progress holds back every other operation until it completes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::auth::{VaultMetadata, VaultStatus, VerifyResult};
use super::lockout::{wipe_scope, FailureOutcome, LockoutPolicy, WipeReport};
use super::record::SealedRecord;
use super::salt::KdfSalt;
use super::secret::VaultSecret;
use super::session::{Clock, SessionManager, SystemClock};
use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::security::{decrypt, derive_key_blocking, encrypt, validate_pin, VaultKey};
use crate::store::{SecretStore, METADATA_KEY, PAYLOAD_KEY, PIN_SET_AT_KEY};

/// PIN-gated encrypted secret store with brute-force lockout.
///
/// Share it between callers with an `Arc`; all methods take `&self`.
pub struct PinVault {
    store: Arc<dyn SecretStore>,
    config: VaultConfig,
    /// Guards the attempt counter; held for the whole of each operation.
    lockout: Mutex<LockoutPolicy>,
    session: Arc<SessionManager>,
    clock: Arc<dyn Clock>,
}

impl PinVault {
    /// Open the vault on top of `store`.
    ///
    /// Restores the persisted attempt counter. If a previous self-destruct
    /// never finished, it is resumed before this returns.
    pub async fn open(store: Arc<dyn SecretStore>, config: VaultConfig) -> VaultResult<Self> {
        Self::open_with_clock(store, config, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(
        store: Arc<dyn SecretStore>,
        config: VaultConfig,
        clock: Arc<dyn Clock>,
    ) -> VaultResult<Self> {
        config.validate()?;

        let mut lockout =
            LockoutPolicy::restore(store.as_ref(), config.max_attempts, &config.app_state_keys)
                .await?;
        if lockout.has_pending_wipe() {
            lockout.finish_wipe(store.as_ref(), config.wipe_retries).await;
        }

        let session = Arc::new(SessionManager::new(
            config.auto_lock_minutes,
            clock.clone(),
        ));

        info!(
            "Vault opened ({} of {} attempts remaining)",
            lockout.attempts_remaining(),
            config.max_attempts
        );

        Ok(Self {
            store,
            config,
            lockout: Mutex::new(lockout),
            session,
            clock,
        })
    }

    /// Configuration the vault was opened with.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Shared handle to the session tracker, usable without the vault lock.
    pub fn session(&self) -> Arc<SessionManager> {
        self.session.clone()
    }

    /// Whether the last unlock is still inside the auto-lock timeout.
    pub fn is_session_valid(&self) -> bool {
        self.session.is_session_valid()
    }

    /// Change the auto-lock timeout (1-10 minutes). Applies to the running
    /// session too.
    pub fn set_auto_lock_minutes(&self, minutes: u32) -> VaultResult<()> {
        self.session.set_timeout_minutes(minutes)
    }

    /// Encrypt and store `secret` under `pin`.
    ///
    /// Replaces any existing secret, resets the attempt counter, leaves the
    /// destroyed state and counts as an unlock. An error means the previous
    /// record (if any) is still in place.
    pub async fn setup(&self, pin: &str, secret: &VaultSecret) -> VaultResult<()> {
        validate_pin(pin)?;

        let mut lockout = self.lockout.lock().await;
        self.ensure_wipe_finished(&mut lockout).await?;

        info!("Setting up vault");

        let salt = KdfSalt::generate(self.config.salt_mode);
        let key = self.derive(pin, &salt).await?;
        self.write_secret(&key, salt, secret).await?;
        drop(key);

        lockout.reset(self.store.as_ref()).await;
        self.session.record_unlock();

        info!("Vault set up successfully");
        Ok(())
    }

    /// Check `pin` against the stored secret.
    ///
    /// A wrong PIN is reported through the returned [`VerifyResult`], not as
    /// an error. Errors are reserved for malformed PINs, a missing secret and
    /// storage failures, none of which consume an attempt.
    pub async fn verify(&self, pin: &str) -> VaultResult<VerifyResult> {
        let mut lockout = self.lockout.lock().await;
        self.verify_locked(&mut lockout, pin).await
    }

    /// [`verify`](Self::verify) for callers that only care about the secret.
    pub async fn unlock(&self, pin: &str) -> VaultResult<VaultSecret> {
        self.verify(pin).await?.into_secret()
    }

    /// Re-encrypt the secret under `new_pin`.
    ///
    /// `current_pin` is verified exactly like [`verify`](Self::verify): a
    /// wrong value costs an attempt and can trigger the self-destruct. On a
    /// vault that has already self-destructed this fails with
    /// `SelfDestructTriggered`. If the new record cannot be written the old
    /// PIN keeps working.
    pub async fn change_pin(&self, current_pin: &str, new_pin: &str) -> VaultResult<VerifyResult> {
        validate_pin(new_pin)?;

        let mut lockout = self.lockout.lock().await;
        if lockout.is_destroyed() {
            return Err(VaultError::SelfDestructTriggered);
        }
        let result = self.verify_locked(&mut lockout, current_pin).await?;

        let Some(secret) = result.secret.as_ref() else {
            return Ok(result);
        };

        let salt = KdfSalt::generate(self.config.salt_mode);
        let key = self.derive(new_pin, &salt).await?;
        self.write_secret(&key, salt, secret).await?;
        drop(key);

        info!("Vault PIN changed");
        Ok(result)
    }

    /// Whether an encrypted secret is stored (setup vs. unlock flow).
    pub async fn has_secret(&self) -> VaultResult<bool> {
        let mut lockout = self.lockout.lock().await;
        if lockout.has_pending_wipe() {
            lockout
                .finish_wipe(self.store.as_ref(), self.config.wipe_retries)
                .await;
        }
        Ok(self.store.get(PAYLOAD_KEY).await?.is_some())
    }

    /// End the current session. Stored data is untouched.
    pub fn lock(&self) {
        info!("Locking vault");
        self.session.end();
    }

    /// Delete every in-scope key (factory reset requested by the host).
    ///
    /// Keys that cannot be deleted are retried before the next operation;
    /// until then this returns `StorageUnavailable`.
    pub async fn wipe(&self) -> VaultResult<WipeReport> {
        let mut lockout = self.lockout.lock().await;
        self.session.end();

        let report = lockout
            .wipe_all(
                self.store.as_ref(),
                wipe_scope(&self.config.app_state_keys),
                self.config.wipe_retries,
            )
            .await;

        if !report.is_complete() {
            return Err(incomplete_wipe_error(report.failed.len()));
        }
        Ok(report)
    }

    /// Current lifecycle state, for choosing between setup, unlock and the
    /// unlocked UI.
    pub async fn status(&self) -> VaultResult<VaultStatus> {
        let lockout = self.lockout.lock().await;

        if lockout.is_destroyed() {
            return Ok(VaultStatus::Destroyed);
        }
        if self.store.get(PAYLOAD_KEY).await?.is_none() {
            return Ok(VaultStatus::NotSetup);
        }
        if self.session.is_session_valid() {
            Ok(VaultStatus::Unlocked)
        } else {
            Ok(VaultStatus::Locked)
        }
    }

    /// Failed verifications left before the self-destruct.
    pub async fn attempts_remaining(&self) -> u32 {
        self.lockout.lock().await.attempts_remaining()
    }

    /// Plaintext metadata about the stored secret, if any.
    pub async fn metadata(&self) -> VaultResult<Option<VaultMetadata>> {
        let _lockout = self.lockout.lock().await;
        match self.store.get(METADATA_KEY).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// When the PIN was last set. Display/audit only, never used to verify.
    pub async fn pin_last_set(&self) -> VaultResult<Option<DateTime<Utc>>> {
        let _lockout = self.lockout.lock().await;
        let Some(bytes) = self.store.get(PIN_SET_AT_KEY).await? else {
            return Ok(None);
        };

        let text = String::from_utf8_lossy(&bytes);
        match DateTime::parse_from_rfc3339(&text) {
            Ok(ts) => Ok(Some(ts.with_timezone(&Utc))),
            Err(e) => {
                warn!("Ignoring unreadable PIN timestamp: {}", e);
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn verify_locked(
        &self,
        lockout: &mut LockoutPolicy,
        pin: &str,
    ) -> VaultResult<VerifyResult> {
        let store = self.store.as_ref();

        if lockout.is_destroyed() {
            if lockout.has_pending_wipe() {
                lockout.finish_wipe(store, self.config.wipe_retries).await;
            }
            debug!("Verify rejected: vault has self-destructed");
            return Ok(VerifyResult::destroyed());
        }

        self.ensure_wipe_finished(lockout).await?;
        validate_pin(pin)?;

        // The storage read happens before anything is counted
        let Some(blob) = store.get(PAYLOAD_KEY).await? else {
            return Err(VaultError::NotSetup);
        };

        match self.open_secret(pin, &blob).await {
            Ok(secret) => {
                lockout.record_success(store).await;
                self.session.record_unlock();
                info!("Vault unlocked");
                Ok(VerifyResult::unlocked(secret, lockout.attempts_remaining()))
            }
            Err(VaultError::DecryptionFailed) => match lockout.record_failure(store).await {
                FailureOutcome::Remaining(remaining) => {
                    warn!("Invalid PIN ({} attempts remaining)", remaining);
                    Ok(VerifyResult::rejected(remaining))
                }
                FailureOutcome::Exhausted => {
                    self.session.end();
                    lockout
                        .self_destruct(
                            store,
                            wipe_scope(&self.config.app_state_keys),
                            self.config.wipe_retries,
                        )
                        .await;
                    Ok(VerifyResult::destroyed())
                }
            },
            Err(e) => Err(e),
        }
    }

    async fn open_secret(&self, pin: &str, blob: &[u8]) -> VaultResult<VaultSecret> {
        let record = SealedRecord::from_bytes(blob)?;
        let key = self.derive(pin, record.salt()).await?;
        let plaintext = decrypt(record.payload(), &key)?;
        drop(key);

        VaultSecret::from_plaintext(&plaintext)
    }

    async fn derive(&self, pin: &str, salt: &KdfSalt) -> VaultResult<VaultKey> {
        derive_key_blocking(
            Zeroizing::new(pin.to_string()),
            salt.as_bytes().to_vec(),
            self.config.pbkdf2_iterations,
        )
        .await
    }

    /// Seal `secret` and commit it with a single `put`.
    ///
    /// Metadata and the PIN timestamp are written afterwards; failing to
    /// write them is logged and does not undo the commit.
    async fn write_secret(
        &self,
        key: &VaultKey,
        salt: KdfSalt,
        secret: &VaultSecret,
    ) -> VaultResult<()> {
        let plaintext = secret.to_plaintext()?;
        let record = SealedRecord::new(salt, encrypt(&plaintext, key)?);
        let now = self.clock.now();
        let metadata = serde_json::to_vec(&VaultMetadata {
            provider: secret.provider().map(str::to_string),
            updated_at: now,
        })?;

        let bytes = record.to_bytes();
        self.store.put(PAYLOAD_KEY, &bytes).await?;
        debug!("Wrote sealed record ({} bytes)", bytes.len());

        if let Err(e) = self.store.put(METADATA_KEY, &metadata).await {
            warn!("Failed to write vault metadata: {}", e);
        }
        if let Err(e) = self
            .store
            .put(PIN_SET_AT_KEY, now.to_rfc3339().as_bytes())
            .await
        {
            warn!("Failed to write PIN timestamp: {}", e);
        }
        Ok(())
    }

    async fn ensure_wipe_finished(&self, lockout: &mut LockoutPolicy) -> VaultResult<()> {
        if !lockout.has_pending_wipe() {
            return Ok(());
        }

        let report = lockout
            .finish_wipe(self.store.as_ref(), self.config.wipe_retries)
            .await;
        if !report.is_complete() {
            return Err(incomplete_wipe_error(report.failed.len()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for PinVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinVault")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn incomplete_wipe_error(remaining: usize) -> VaultError {
    VaultError::StorageUnavailable(format!(
        "wipe incomplete: {} keys could not be deleted",
        remaining
    ))
}
