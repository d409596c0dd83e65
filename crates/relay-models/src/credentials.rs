//! Opaque credential material.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Authentication state for one identity.
///
/// The relay never interprets the contents beyond the `registered` flag; the
/// blob is handed back to the protocol client exactly as it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialBlob(Value);

impl CredentialBlob {
    /// Wraps raw credential material.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Whether the identity completed pairing previously.
    pub fn is_registered(&self) -> bool {
        self.0
            .get("registered")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Borrows the raw material.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the blob, returning the raw material.
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for CredentialBlob {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registered_flag() {
        assert!(CredentialBlob::new(json!({"registered": true, "me": {"id": "1"}})).is_registered());
        assert!(!CredentialBlob::new(json!({"registered": false})).is_registered());
        assert!(!CredentialBlob::new(json!({"noiseKey": "abc"})).is_registered());
        assert!(!CredentialBlob::new(json!("not-an-object")).is_registered());
    }

    #[test]
    fn test_passthrough_unchanged() {
        let raw = json!({"registered": true, "signedPreKey": {"keyId": 1}});
        let blob = CredentialBlob::from(raw.clone());
        let json = serde_json::to_value(&blob).unwrap();
        assert_eq!(json, raw);
        assert_eq!(blob.into_value(), raw);
    }
}
