//! Brute-force lockout and the self-destruct wipe.
//!
//! The policy has two states:
//! - `Active` while fewer than `max` consecutive verifications failed
//! - `Destroyed` once the `max`-th failure lands (terminal until a new setup)
//!
//! The failed-attempt counter is persisted so restarting the process does
//! not hand out a fresh set of attempts. During a wipe the counter is the
//! last key deleted: if the wipe is interrupted, the counter still says
//! "exhausted" and the wipe resumes on the next open.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::VaultResult;
use crate::store::{
    SecretStore, StoreResult, ATTEMPTS_KEY, METADATA_KEY, PAYLOAD_KEY, PIN_SET_AT_KEY,
};

/// Base delay between retries of a failed deletion. Grows linearly.
const WIPE_RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Consecutive failed verification attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptState {
    pub count: u32,
    pub max: u32,
}

impl AttemptState {
    pub fn new(max: u32) -> Self {
        Self { count: 0, max }
    }

    pub fn remaining(&self) -> u32 {
        self.max.saturating_sub(self.count)
    }

    pub fn is_exhausted(&self) -> bool {
        self.count >= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum LockoutState {
    Active,
    Destroyed,
}

/// Result of recording one failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Attempts left before the wipe.
    Remaining(u32),
    /// This failure reached the threshold.
    Exhausted,
}

/// What a wipe managed to delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WipeReport {
    pub deleted: usize,
    /// Keys still present after all retries.
    pub failed: Vec<String>,
}

impl WipeReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Every key erased by a wipe, in deletion order.
///
/// The ciphertext goes first so the secret is unreadable as early as
/// possible; the attempt counter goes last.
pub fn wipe_scope(app_state_keys: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = [PAYLOAD_KEY, METADATA_KEY, PIN_SET_AT_KEY]
        .iter()
        .map(|k| k.to_string())
        .collect();
    keys.extend(app_state_keys.iter().cloned());
    keys.push(ATTEMPTS_KEY.to_string());
    keys
}

#[derive(Debug)]
pub struct LockoutPolicy {
    attempts: AttemptState,
    state: LockoutState,
    pending_wipe: Vec<String>,
}

impl LockoutPolicy {
    pub fn new(max: u32) -> Self {
        Self {
            attempts: AttemptState::new(max),
            state: LockoutState::Active,
            pending_wipe: Vec::new(),
        }
    }

    /// Rebuild the policy from the persisted counter.
    ///
    /// A counter already at `max` means a previous wipe never finished; the
    /// policy comes back `Destroyed` with the whole scope pending. A damaged
    /// counter record restores as one attempt left and is rewritten.
    pub async fn restore(
        store: &dyn SecretStore,
        max: u32,
        app_state_keys: &[String],
    ) -> VaultResult<Self> {
        let mut policy = Self::new(max);

        if let Some(bytes) = store.get(ATTEMPTS_KEY).await? {
            match serde_json::from_slice::<AttemptState>(&bytes) {
                Ok(persisted) => {
                    policy.attempts.count = persisted.count.min(max);
                    debug!(
                        "Restored attempt counter: {}/{}",
                        policy.attempts.count, max
                    );
                }
                Err(e) => {
                    warn!("Attempt counter record is damaged ({}); one attempt left", e);
                    policy.attempts.count = max.saturating_sub(1);
                    if let Err(e) = persist_attempts(store, &policy.attempts).await {
                        warn!("Failed to rewrite damaged attempt counter: {}", e);
                    }
                }
            }
        }

        if policy.attempts.is_exhausted() {
            warn!("Attempt counter exhausted on open; resuming self-destruct");
            policy.state = LockoutState::Destroyed;
            policy.pending_wipe = wipe_scope(app_state_keys);
        }

        Ok(policy)
    }

    pub fn attempts(&self) -> AttemptState {
        self.attempts
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.attempts.remaining()
    }

    pub fn state(&self) -> LockoutState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == LockoutState::Destroyed
    }

    pub fn has_pending_wipe(&self) -> bool {
        !self.pending_wipe.is_empty()
    }

    /// Count one failed verification.
    ///
    /// Failing to persist the new count is logged, not returned: the
    /// in-memory counter stays authoritative for this process.
    pub async fn record_failure(&mut self, store: &dyn SecretStore) -> FailureOutcome {
        self.attempts.count = (self.attempts.count + 1).min(self.attempts.max);

        if self.attempts.is_exhausted() {
            return FailureOutcome::Exhausted;
        }

        if let Err(e) = persist_attempts(store, &self.attempts).await {
            warn!("Failed to persist attempt counter: {}", e);
        }

        FailureOutcome::Remaining(self.attempts.remaining())
    }

    /// Reset the counter after a successful verification.
    pub async fn record_success(&mut self, store: &dyn SecretStore) {
        if self.attempts.count == 0 {
            return;
        }

        self.attempts.count = 0;
        if let Err(e) = persist_attempts(store, &self.attempts).await {
            warn!("Failed to persist attempt counter reset: {}", e);
        }
    }

    /// Start over after a fresh setup: `Active`, zero attempts.
    ///
    /// Runs after the new secret is committed, so a failed write of the
    /// counter is only logged.
    pub async fn reset(&mut self, store: &dyn SecretStore) {
        self.attempts.count = 0;
        self.state = LockoutState::Active;
        if let Err(e) = persist_attempts(store, &self.attempts).await {
            warn!("Failed to persist attempt counter reset: {}", e);
        }
    }

    /// Transition `Active -> Destroyed` and wipe everything in `scope`.
    pub async fn self_destruct(
        &mut self,
        store: &dyn SecretStore,
        scope: Vec<String>,
        retries: u32,
    ) -> WipeReport {
        warn!("Failed-attempt threshold reached; destroying vault data");

        self.state = LockoutState::Destroyed;
        self.attempts.count = self.attempts.max;

        // Durable marker first, so an interrupted wipe resumes on restart
        if let Err(e) = persist_attempts(store, &self.attempts).await {
            warn!("Failed to persist exhausted attempt counter: {}", e);
        }

        self.pending_wipe = scope;
        self.finish_wipe(store, retries).await
    }

    /// Host-initiated factory reset. Leaves the policy `Active`.
    pub async fn wipe_all(
        &mut self,
        store: &dyn SecretStore,
        scope: Vec<String>,
        retries: u32,
    ) -> WipeReport {
        info!("Wiping vault data on request");

        self.state = LockoutState::Active;
        self.attempts.count = 0;
        self.pending_wipe = scope;
        self.finish_wipe(store, retries).await
    }

    /// Delete whatever is left of an unfinished wipe.
    pub async fn finish_wipe(&mut self, store: &dyn SecretStore, retries: u32) -> WipeReport {
        if self.pending_wipe.is_empty() {
            return WipeReport::default();
        }

        let mut report = WipeReport::default();
        let mut defer_attempts_key = false;

        for key in &self.pending_wipe {
            if key == ATTEMPTS_KEY {
                defer_attempts_key = true;
                continue;
            }
            match delete_with_retry(store, key, retries).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    error!("Failed to delete '{}' during wipe: {}", key, e);
                    report.failed.push(key.clone());
                }
            }
        }

        if defer_attempts_key {
            if report.is_complete() {
                match delete_with_retry(store, ATTEMPTS_KEY, retries).await {
                    Ok(()) => report.deleted += 1,
                    Err(e) => {
                        error!("Failed to delete attempt counter during wipe: {}", e);
                        report.failed.push(ATTEMPTS_KEY.to_string());
                    }
                }
            } else {
                report.failed.push(ATTEMPTS_KEY.to_string());
            }
        }

        if report.is_complete() {
            info!("Wipe complete ({} keys deleted)", report.deleted);
        } else {
            error!(
                "Wipe incomplete, {} keys remain and will be retried",
                report.failed.len()
            );
        }

        self.pending_wipe = report.failed.clone();
        report
    }
}

async fn persist_attempts(store: &dyn SecretStore, attempts: &AttemptState) -> VaultResult<()> {
    let bytes = serde_json::to_vec(attempts)?;
    store.put(ATTEMPTS_KEY, &bytes).await?;
    Ok(())
}

async fn delete_with_retry(store: &dyn SecretStore, key: &str, retries: u32) -> StoreResult<()> {
    let mut attempt = 0;
    loop {
        match store.delete(key).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(
                    "Deleting '{}' failed (retry {}/{}): {}",
                    key, attempt, retries, e
                );
                tokio::time::sleep(WIPE_RETRY_BACKOFF * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::store::{MemoryStore, StoreError};

    /// Store whose deletes fail for selected keys.
    #[derive(Default)]
    struct StickyStore {
        inner: MemoryStore,
        sticky: Mutex<HashSet<String>>,
        read_only: AtomicBool,
    }

    impl StickyStore {
        fn fail_puts(&self) {
            self.read_only.store(true, Ordering::SeqCst);
        }

        fn make_sticky(&self, key: &str) {
            self.sticky.lock().unwrap().insert(key.to_string());
        }

        fn release(&self) {
            self.sticky.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl SecretStore for StickyStore {
        async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
            if self.read_only.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("read-only".into()));
            }
            self.inner.put(key, value).await
        }

        async fn delete(&self, key: &str) -> StoreResult<()> {
            if self.sticky.lock().unwrap().contains(key) {
                return Err(StoreError::Unavailable("device busy".into()));
            }
            self.inner.delete(key).await
        }
    }

    async fn seed(store: &dyn SecretStore, app_state_keys: &[String]) {
        for key in wipe_scope(app_state_keys) {
            store.put(&key, b"x").await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_failures_count_down_then_exhaust() {
        let store = MemoryStore::new();
        let mut policy = LockoutPolicy::new(3);

        assert_eq!(
            policy.record_failure(&store).await,
            FailureOutcome::Remaining(2)
        );
        assert_eq!(
            policy.record_failure(&store).await,
            FailureOutcome::Remaining(1)
        );
        assert_eq!(policy.record_failure(&store).await, FailureOutcome::Exhausted);
        assert_eq!(policy.attempts().count, 3);
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let store = MemoryStore::new();
        let mut policy = LockoutPolicy::new(10);
        policy.record_failure(&store).await;
        policy.record_failure(&store).await;

        policy.record_success(&store).await;
        assert_eq!(policy.attempts_remaining(), 10);

        let restored = LockoutPolicy::restore(&store, 10, &[]).await.unwrap();
        assert_eq!(restored.attempts().count, 0);
    }

    #[tokio::test]
    async fn test_counter_survives_restore() {
        let store = MemoryStore::new();
        let mut policy = LockoutPolicy::new(10);
        for _ in 0..4 {
            policy.record_failure(&store).await;
        }

        let restored = LockoutPolicy::restore(&store, 10, &[]).await.unwrap();
        assert_eq!(restored.attempts().count, 4);
        assert_eq!(restored.state(), LockoutState::Active);
    }

    #[tokio::test]
    async fn test_damaged_counter_restores_with_one_attempt_left() {
        let store = MemoryStore::new();
        store.put(ATTEMPTS_KEY, b"{garbage").await.unwrap();

        let mut policy = LockoutPolicy::restore(&store, 10, &[]).await.unwrap();
        assert_eq!(policy.state(), LockoutState::Active);
        assert_eq!(policy.attempts_remaining(), 1);

        // The record was rewritten in a readable form
        let rewritten: AttemptState =
            serde_json::from_slice(&store.get(ATTEMPTS_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(rewritten.count, 9);

        assert_eq!(policy.record_failure(&store).await, FailureOutcome::Exhausted);
    }

    #[tokio::test]
    async fn test_reset_tolerates_counter_write_failure() {
        let store = StickyStore::default();
        let mut policy = LockoutPolicy::new(3);
        policy.record_failure(&store).await;

        store.fail_puts();
        policy.reset(&store).await;
        assert_eq!(policy.attempts_remaining(), 3);
        assert_eq!(policy.state(), LockoutState::Active);
    }

    #[tokio::test]
    async fn test_self_destruct_wipes_scope() {
        let store = MemoryStore::new();
        seed(&store, &["expenses".to_string()]).await;
        store.put("unrelated", b"keep").await.unwrap();

        let mut policy = LockoutPolicy::new(1);
        assert_eq!(policy.record_failure(&store).await, FailureOutcome::Exhausted);

        let scope = wipe_scope(&["expenses".to_string()]);
        let report = policy.self_destruct(&store, scope, 0).await;

        assert!(report.is_complete());
        assert!(policy.is_destroyed());
        assert!(!policy.has_pending_wipe());
        assert_eq!(store.len().await, 1);
        assert!(store.contains("unrelated").await);
    }

    #[tokio::test]
    async fn test_wiping_twice_is_harmless() {
        let store = MemoryStore::new();
        seed(&store, &[]).await;

        let mut policy = LockoutPolicy::new(1);
        let scope = wipe_scope(&[]);
        policy.self_destruct(&store, scope.clone(), 0).await;
        let second = policy.self_destruct(&store, scope, 0).await;

        assert!(second.is_complete());
        assert!(policy.is_destroyed());
    }

    #[tokio::test]
    async fn test_incomplete_wipe_keeps_counter_and_resumes() {
        let store = StickyStore::default();
        seed(&store, &[]).await;
        store.make_sticky(PAYLOAD_KEY);

        let mut policy = LockoutPolicy::new(2);
        let report = policy.self_destruct(&store, wipe_scope(&[]), 1).await;

        assert!(!report.is_complete());
        assert!(report.failed.contains(&PAYLOAD_KEY.to_string()));
        assert!(report.failed.contains(&ATTEMPTS_KEY.to_string()));
        assert!(policy.has_pending_wipe());

        // A restart at this point would resume the wipe
        let restored = LockoutPolicy::restore(&store, 2, &[]).await.unwrap();
        assert!(restored.is_destroyed());
        assert!(restored.has_pending_wipe());

        store.release();
        let report = policy.finish_wipe(&store, 0).await;
        assert!(report.is_complete());
        assert!(!policy.has_pending_wipe());
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_delete_failure() {
        // Deletes fail while the key is sticky; release it from another task
        let store = std::sync::Arc::new(StickyStore::default());
        store.put(PAYLOAD_KEY, b"x").await.unwrap();
        store.make_sticky(PAYLOAD_KEY);

        let releaser = {
            let store = store.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                store.release();
            })
        };

        let mut policy = LockoutPolicy::new(1);
        let report = policy
            .wipe_all(store.as_ref(), vec![PAYLOAD_KEY.to_string()], 5)
            .await;
        releaser.await.unwrap();

        assert!(report.is_complete());
        assert!(!store.inner.contains(PAYLOAD_KEY).await);
    }

    #[test]
    fn test_wipe_scope_order() {
        let scope = wipe_scope(&["loans".to_string()]);
        assert_eq!(scope.first().map(String::as_str), Some(PAYLOAD_KEY));
        assert_eq!(scope.last().map(String::as_str), Some(ATTEMPTS_KEY));
        assert!(scope.contains(&"loans".to_string()));
    }
}
