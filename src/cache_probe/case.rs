//! Request cases and their payload fingerprints.
//!
//! A case is sent as RFC 8785 canonical JSON, so two cases with equal payloads
//! always produce byte-identical request bodies regardless of key order.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::error::ProbeError;

/// A labelled request payload. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestCase {
    label: String,
    payload: Value,
    canonical: String,
    fingerprint: String,
}

impl RequestCase {
    /// Builds a case from any serializable payload.
    pub fn new(label: impl Into<String>, payload: impl Serialize) -> Result<Self, ProbeError> {
        let label = label.into();
        let payload = serde_json::to_value(payload).map_err(|source| ProbeError::Payload {
            label: label.clone(),
            source,
        })?;
        let canonical = canonicalize(&payload).map_err(|source| ProbeError::Payload {
            label: label.clone(),
            source,
        })?;
        let fingerprint = fingerprint_bytes(canonical.as_bytes());

        Ok(Self {
            label,
            payload,
            canonical,
            fingerprint,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Canonical JSON text sent as the request body.
    pub fn canonical_body(&self) -> &str {
        &self.canonical
    }

    /// `sha256:<hex>` over the canonical body.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn canonicalize(payload: &Value) -> Result<String, serde_json::Error> {
    serde_jcs::to_string(payload)
}

fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

/// Fingerprint of an arbitrary payload, as used to key cache entries.
pub fn fingerprint(payload: &Value) -> Result<String, serde_json::Error> {
    Ok(fingerprint_bytes(canonicalize(payload)?.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let payload = json!({"architecture": "microservices", "traffic": {"daily_active_users": 10000}});
        let first = fingerprint(&payload).expect("fingerprint");
        let second = fingerprint(&payload).expect("fingerprint");
        assert_eq!(first, second);
        assert!(first.starts_with("sha256:"));
        assert_eq!(first.len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"a": 1, "b": {"y": true, "x": null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b": {"x": null, "y": true}, "a": 1}"#).unwrap();
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_numeric_change_changes_fingerprint() {
        let a = RequestCase::new("a", json!({"daily_active_users": 10000})).unwrap();
        let b = RequestCase::new("b", json!({"daily_active_users": 50000})).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_json_round_trip_keeps_fingerprint() {
        let original = RequestCase::new(
            "payload-a",
            json!({"currency": "USD", "traffic": {"growth_rate_yoy": 0.1, "compliance": []}}),
        )
        .unwrap();

        let text = serde_json::to_string(original.payload()).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        let reparsed = RequestCase::new("payload-a", parsed).unwrap();

        assert_eq!(original.fingerprint(), reparsed.fingerprint());
        assert_eq!(original.canonical_body(), reparsed.canonical_body());
    }

    #[test]
    fn test_canonical_body_sorts_keys() {
        let case = RequestCase::new("c", json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(case.canonical_body(), r#"{"a":1,"b":2}"#);
    }

    #[derive(Serialize)]
    struct Estimate<'a> {
        architecture: &'a str,
        currency: &'a str,
    }

    #[test]
    fn test_struct_payload_matches_equivalent_json() {
        let from_struct = RequestCase::new(
            "s",
            Estimate {
                architecture: "monolith",
                currency: "USD",
            },
        )
        .unwrap();
        let from_json =
            RequestCase::new("j", json!({"currency": "USD", "architecture": "monolith"})).unwrap();
        assert_eq!(from_struct.fingerprint(), from_json.fingerprint());
    }
}
