use crate::error::{VaultError, VaultResult};

/// Minimum number of PIN digits.
pub const MIN_PIN_LEN: usize = 4;

/// Maximum number of PIN digits.
pub const MAX_PIN_LEN: usize = 6;

/// Check that `pin` is a 4-6 digit numeric string.
pub fn validate_pin(pin: &str) -> VaultResult<()> {
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(VaultError::InvalidPinFormat(
            "PIN must contain only digits".into(),
        ));
    }

    let len = pin.len();
    if len < MIN_PIN_LEN {
        return Err(VaultError::InvalidPinFormat(format!(
            "PIN must be at least {} digits",
            MIN_PIN_LEN
        )));
    }
    if len > MAX_PIN_LEN {
        return Err(VaultError::InvalidPinFormat(format!(
            "PIN must be at most {} digits",
            MAX_PIN_LEN
        )));
    }

    Ok(())
}
