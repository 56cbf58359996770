//! Ed25519 keypair generation, canonical payload hashing, certificate
//! signing, and verification against an embedded public key.
//!
//! Ports `router/signing.py`, which used the `cryptography` package's
//! Ed25519 classes, onto `ed25519-dalek`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{AuthorityError, Result};

/// The embedded public key, committed alongside the binary. Loaded once at
/// first use, mirroring the Python original's sibling-file import-time
/// load. This file is a `critical_files` entry (spec §4.8's "Signature
/// infrastructure" note): rotating the key changes `combined_sha256` and
/// invalidates every certificate signed under the old key.
pub const EMBEDDED_PUBLIC_KEY_B64: &str = include_str!("public_key.b64");

/// Generates a fresh Ed25519 keypair. Offline tooling, not part of the
/// runtime loop's hot path — the only place in this crate where real
/// randomness (not hash-derived determinism) is correct.
pub fn generate_keypair() -> (SigningKey, VerifyingKey) {
    let mut csprng = OsRng;
    let signing_key = SigningKey::generate(&mut csprng);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Canonical JSON serialization: keys sorted lexicographically, minimal
/// separators. Relies on `serde_json::Map`'s default `BTreeMap` backing
/// (no `preserve_order` feature) to sort keys automatically on
/// `Value::to_string`.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(value).expect("Value serialization cannot fail")
}

/// The signed payload is the canonical serialization of the certificate
/// body with `cert_sig` and `cert_sha256` removed (spec §3).
pub fn cert_signing_payload(cert_body: &Value) -> Value {
    let mut body = cert_body.clone();
    if let Some(obj) = body.as_object_mut() {
        obj.remove("cert_sig");
        obj.remove("cert_sha256");
    }
    body
}

/// `compute_cert_payload_hash`: SHA-256 over the canonical signing payload.
pub fn compute_cert_payload_hash(cert_body: &Value) -> [u8; 32] {
    let payload = cert_signing_payload(cert_body);
    let canonical = canonical_json(&payload);
    let digest = Sha256::digest(canonical.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Signs the certificate's canonical payload hash, returning a base64
/// `cert_sig`.
pub fn sign_certificate(signing_key: &SigningKey, cert_body: &Value) -> String {
    let hash = compute_cert_payload_hash(cert_body);
    let signature: Signature = signing_key.sign(&hash);
    BASE64.encode(signature.to_bytes())
}

/// Verifies `cert_sig` (base64) over the certificate's canonical payload
/// hash using the given raw public key bytes.
pub fn verify_certificate_signature(
    public_key_bytes: &[u8; 32],
    cert_body: &Value,
    cert_sig_b64: &str,
) -> Result<()> {
    let verifying_key = VerifyingKey::from_bytes(public_key_bytes)
        .map_err(|e| AuthorityError::Signing(format!("invalid public key: {e}")))?;

    let sig_bytes = BASE64
        .decode(cert_sig_b64)
        .map_err(|e| AuthorityError::Signing(format!("invalid base64 signature: {e}")))?;
    let sig_array: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| AuthorityError::Signing("signature is not 64 bytes".to_string()))?;
    let signature = Signature::from_bytes(&sig_array);

    let hash = compute_cert_payload_hash(cert_body);
    verifying_key
        .verify_strict(&hash, &signature)
        .map_err(|e| AuthorityError::SignatureInvalid(e.to_string()))
}

/// Decodes the embedded base64 public key into raw bytes.
pub fn embedded_public_key() -> Result<[u8; 32]> {
    let trimmed = EMBEDDED_PUBLIC_KEY_B64.trim();
    let decoded = BASE64
        .decode(trimmed)
        .map_err(|e| AuthorityError::Signing(format!("invalid embedded public key: {e}")))?;
    decoded
        .as_slice()
        .try_into()
        .map_err(|_| AuthorityError::Signing("embedded public key is not 32 bytes".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sign_then_verify_round_trips() {
        let (signing_key, verifying_key) = generate_keypair();
        let body = json!({
            "cert_version": "v0.2",
            "build_meta_sha256": "abc123",
            "promoted_at": "2026-01-01T00:00:00Z",
        });
        let sig = sign_certificate(&signing_key, &body);
        let pub_bytes = verifying_key.to_bytes();
        assert!(verify_certificate_signature(&pub_bytes, &body, &sig).is_ok());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let (signing_key, verifying_key) = generate_keypair();
        let body = json!({"cert_version": "v0.2", "build_meta_sha256": "abc123"});
        let sig = sign_certificate(&signing_key, &body);
        let tampered = json!({"cert_version": "v0.2", "build_meta_sha256": "zzz999"});
        let pub_bytes = verifying_key.to_bytes();
        assert!(verify_certificate_signature(&pub_bytes, &tampered, &sig).is_err());
    }

    #[test]
    fn signing_payload_strips_signature_fields() {
        let body = json!({
            "cert_version": "v0.2",
            "cert_sig": "whatever",
            "cert_sha256": "whatever2",
        });
        let payload = cert_signing_payload(&body);
        assert!(payload.get("cert_sig").is_none());
        assert!(payload.get("cert_sha256").is_none());
        assert_eq!(payload.get("cert_version").unwrap(), "v0.2");
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let value = json!({"b": 1, "a": 2});
        assert_eq!(canonical_json(&value), r#"{"a":2,"b":1}"#);
    }
}
