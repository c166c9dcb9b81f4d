//! Host-facing vault configuration.
//!
//! Stored as pretty-printed JSON. A missing file means defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};
use crate::security::{DEFAULT_ITERATIONS, MIN_ITERATIONS};

/// Shortest auto-lock timeout the host may configure.
pub const MIN_AUTO_LOCK_MINUTES: u32 = 1;

/// Longest auto-lock timeout the host may configure.
pub const MAX_AUTO_LOCK_MINUTES: u32 = 10;

/// How the PBKDF2 salt is chosen when a secret is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaltMode {
    /// Fresh random salt generated at setup and stored in the sealed record.
    #[default]
    PerInstallation,
    /// The fixed application-wide salt shared by every installation.
    LegacyStatic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Consecutive failed verifications that trigger the self-destruct.
    pub max_attempts: u32,
    pub pbkdf2_iterations: u32,
    /// Auto-lock timeout, 1-10 minutes.
    pub auto_lock_minutes: u32,
    pub salt_mode: SaltMode,
    /// How many times a single key deletion is retried during a wipe.
    pub wipe_retries: u32,
    /// Extra host application keys erased by the self-destruct.
    pub app_state_keys: Vec<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            pbkdf2_iterations: DEFAULT_ITERATIONS,
            auto_lock_minutes: 5,
            salt_mode: SaltMode::default(),
            wipe_retries: 3,
            app_state_keys: Vec::new(),
        }
    }
}

impl VaultConfig {
    pub fn validate(&self) -> VaultResult<()> {
        if self.max_attempts < 1 {
            return Err(VaultError::Config("max_attempts must be >= 1".into()));
        }
        if self.pbkdf2_iterations < MIN_ITERATIONS {
            return Err(VaultError::Config(format!(
                "pbkdf2_iterations must be >= {}",
                MIN_ITERATIONS
            )));
        }
        validate_auto_lock_minutes(self.auto_lock_minutes)?;
        if self.app_state_keys.iter().any(|k| k.is_empty()) {
            return Err(VaultError::Config(
                "app_state_keys must not contain empty keys".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_auto_lock_minutes(minutes: u32) -> VaultResult<()> {
    if !(MIN_AUTO_LOCK_MINUTES..=MAX_AUTO_LOCK_MINUTES).contains(&minutes) {
        return Err(VaultError::Config(format!(
            "auto_lock_minutes must be between {} and {}",
            MIN_AUTO_LOCK_MINUTES, MAX_AUTO_LOCK_MINUTES
        )));
    }
    Ok(())
}

/// Load and validate the config at `path`, or defaults if it doesn't exist.
pub fn load_config(path: &Path) -> VaultResult<VaultConfig> {
    if !path.exists() {
        return Ok(VaultConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| VaultError::Config(format!("Failed to read config file: {}", e)))?;
    let config: VaultConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &VaultConfig) -> VaultResult<()> {
    config.validate()?;
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)
        .map_err(|e| VaultError::Config(format!("Failed to write config file: {}", e)))?;
    Ok(())
}
