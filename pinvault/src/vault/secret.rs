//! The plaintext structure protected by the vault.
//!
//! The vault does not interpret the fields; it only guarantees that what
//! goes into `setup` comes back out of `verify`. On disk (inside the
//! ciphertext) the secret is wrapped in a versioned envelope so that a
//! decrypted blob of an unexpected shape is rejected instead of trusted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{VaultError, VaultResult};

/// Field name whose value is mirrored into the plaintext metadata.
pub const PROVIDER_FIELD: &str = "provider";

/// Named string fields plus the time they were saved.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultSecret {
    fields: BTreeMap<String, String>,
    saved_at: DateTime<Utc>,
}

impl VaultSecret {
    pub fn new() -> Self {
        Self::with_timestamp(Utc::now())
    }

    pub fn with_timestamp(saved_at: DateTime<Utc>) -> Self {
        Self {
            fields: BTreeMap::new(),
            saved_at,
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if let Some(mut old) = self.fields.insert(name.into(), value.into()) {
            old.zeroize();
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn saved_at(&self) -> DateTime<Utc> {
        self.saved_at
    }

    pub fn provider(&self) -> Option<&str> {
        self.get(PROVIDER_FIELD)
    }

    /// Serialize into the versioned envelope.
    pub(crate) fn to_plaintext(&self) -> VaultResult<Zeroizing<Vec<u8>>> {
        let envelope = SecretEnvelopeRef::V1 {
            fields: &self.fields,
            saved_at: self.saved_at,
        };
        Ok(Zeroizing::new(serde_json::to_vec(&envelope)?))
    }

    /// Decode a decrypted envelope.
    ///
    /// Anything that is not a well-formed current envelope is reported as
    /// [`VaultError::DecryptionFailed`].
    pub(crate) fn from_plaintext(plaintext: &[u8]) -> VaultResult<Self> {
        let envelope: SecretEnvelope =
            serde_json::from_slice(plaintext).map_err(|_| VaultError::DecryptionFailed)?;

        match envelope {
            SecretEnvelope::V1 { fields, saved_at } => {
                if fields.keys().any(|k| k.is_empty()) {
                    return Err(VaultError::DecryptionFailed);
                }
                Ok(Self { fields, saved_at })
            }
        }
    }
}

impl Default for VaultSecret {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VaultSecret {
    fn drop(&mut self) {
        for value in self.fields.values_mut() {
            value.zeroize();
        }
    }
}

impl std::fmt::Debug for VaultSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Field names only; values stay out of logs
        f.debug_struct("VaultSecret")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("saved_at", &self.saved_at)
            .finish()
    }
}

impl Serialize for VaultSecret {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("VaultSecret", 2)?;
        state.serialize_field("fields", &self.fields)?;
        state.serialize_field("savedAt", &self.saved_at)?;
        state.end()
    }
}

#[derive(Deserialize)]
#[serde(tag = "schema", rename_all = "snake_case")]
enum SecretEnvelope {
    V1 {
        fields: BTreeMap<String, String>,
        saved_at: DateTime<Utc>,
    },
}

#[derive(Serialize)]
#[serde(tag = "schema", rename_all = "snake_case")]
enum SecretEnvelopeRef<'a> {
    V1 {
        fields: &'a BTreeMap<String, String>,
        saved_at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let secret = VaultSecret::new()
            .with_field("apiKey", "sk-abc")
            .with_field("provider", "openai")
            .with_field("baseUrl", "https://api.example.com");

        let plaintext = secret.to_plaintext().unwrap();
        let decoded = VaultSecret::from_plaintext(&plaintext).unwrap();

        assert_eq!(decoded, secret);
        assert_eq!(decoded.provider(), Some("openai"));
    }

    #[test]
    fn test_envelope_is_tagged() {
        let plaintext = VaultSecret::new().with_field("a", "b").to_plaintext().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&plaintext).unwrap();
        assert_eq!(value["schema"], "v1");
        assert_eq!(value["fields"]["a"], "b");
    }

    #[test]
    fn test_untagged_object_is_rejected() {
        let legacy = br#"{"apiKey":"sk-abc","provider":"openai"}"#;
        assert!(matches!(
            VaultSecret::from_plaintext(legacy),
            Err(VaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_unknown_schema_is_rejected() {
        let future = br#"{"schema":"v9","fields":{},"saved_at":"2026-01-01T00:00:00Z"}"#;
        assert!(VaultSecret::from_plaintext(future).is_err());
    }

    #[test]
    fn test_non_string_field_values_are_rejected() {
        let bad = br#"{"schema":"v1","fields":{"apiKey":42},"saved_at":"2026-01-01T00:00:00Z"}"#;
        assert!(VaultSecret::from_plaintext(bad).is_err());
    }

    #[test]
    fn test_debug_hides_values() {
        let secret = VaultSecret::new().with_field("apiKey", "sk-very-secret");
        let printed = format!("{:?}", secret);
        assert!(printed.contains("apiKey"));
        assert!(!printed.contains("sk-very-secret"));
    }
}
