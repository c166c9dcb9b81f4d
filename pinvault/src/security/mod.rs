mod cipher;
mod kdf;
mod pin;

pub use cipher::{decrypt, encrypt, EncryptedPayload, IV_SIZE, TAG_SIZE};
pub use kdf::{
    derive_key, derive_key_blocking, VaultKey, DEFAULT_ITERATIONS, KEY_LEN, MIN_ITERATIONS,
};
pub use pin::{validate_pin, MAX_PIN_LEN, MIN_PIN_LEN};
