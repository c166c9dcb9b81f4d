//! Auto-lock session tracking.
//!
//! The session only remembers when the vault was last unlocked. Whether it
//! is still valid is computed on demand against the *current* timeout, so a
//! host changing the auto-lock setting affects sessions already running.
//! Session state lives for the process only; it is never persisted.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use crate::config::validate_auto_lock_minutes;
use crate::error::VaultResult;

/// Sentinel for "no unlock recorded".
const NO_UNLOCK: i64 = i64::MIN;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Snapshot of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub last_unlock_at: DateTime<Utc>,
    pub timeout_minutes: u32,
}

/// Tracks the last successful unlock and the auto-lock timeout.
///
/// Lock-free so the host can poll it without contending with vault
/// operations.
pub struct SessionManager {
    last_unlock_ms: AtomicI64,
    timeout_minutes: AtomicU32,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(timeout_minutes: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            last_unlock_ms: AtomicI64::new(NO_UNLOCK),
            timeout_minutes: AtomicU32::new(timeout_minutes),
            clock,
        }
    }

    /// Whether the last unlock is still within the auto-lock timeout.
    pub fn is_session_valid(&self) -> bool {
        self.is_session_valid_at(self.clock.now())
    }

    /// [`is_session_valid`](Self::is_session_valid) against an explicit time.
    pub fn is_session_valid_at(&self, now: DateTime<Utc>) -> bool {
        let last = self.last_unlock_ms.load(Ordering::Acquire);
        if last == NO_UNLOCK {
            return false;
        }

        let elapsed_ms = now.timestamp_millis().saturating_sub(last);
        if elapsed_ms < 0 {
            // Unlock time in the future: the clock went backwards
            return false;
        }

        let timeout_ms = i64::from(self.timeout_minutes()) * 60_000;
        elapsed_ms <= timeout_ms
    }

    pub fn last_unlock_at(&self) -> Option<DateTime<Utc>> {
        match self.last_unlock_ms.load(Ordering::Acquire) {
            NO_UNLOCK => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    pub fn timeout_minutes(&self) -> u32 {
        self.timeout_minutes.load(Ordering::Acquire)
    }

    /// Change the auto-lock timeout (1-10 minutes).
    pub fn set_timeout_minutes(&self, minutes: u32) -> VaultResult<()> {
        validate_auto_lock_minutes(minutes)?;
        self.timeout_minutes.store(minutes, Ordering::Release);
        debug!("Auto-lock timeout set to {} minutes", minutes);
        Ok(())
    }

    pub fn state(&self) -> Option<SessionState> {
        self.last_unlock_at().map(|last_unlock_at| SessionState {
            last_unlock_at,
            timeout_minutes: self.timeout_minutes(),
        })
    }

    pub(crate) fn record_unlock(&self) {
        let now = self.clock.now();
        self.last_unlock_ms
            .store(now.timestamp_millis(), Ordering::Release);
    }

    /// Forget the current session (lock, logout, wipe).
    pub fn end(&self) {
        self.last_unlock_ms.store(NO_UNLOCK, Ordering::Release);
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("last_unlock_at", &self.last_unlock_at())
            .field("timeout_minutes", &self.timeout_minutes())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_clock {
    use std::sync::atomic::{AtomicI64, Ordering};

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::Clock;

    /// Clock that only moves when told to.
    pub struct ManualClock {
        now_ms: AtomicI64,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                now_ms: AtomicI64::new(start.timestamp_millis()),
            }
        }

        pub fn advance(&self, by: Duration) {
            self.now_ms
                .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.timestamp_millis_opt(self.now_ms.load(Ordering::SeqCst))
                .single()
                .unwrap_or_else(Utc::now)
        }
    }
}
