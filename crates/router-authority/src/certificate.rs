//! Promotion certificates and build metadata: the two halves of the
//! integrity check that `bind_authority` runs at startup (spec §4.7).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{AuthorityError, Result};
use crate::signing::{self, verify_certificate_signature};

pub const EXPECTED_CERT_VERSION: &str = "v0.2";

/// A signed JSON document binding a runtime authority tier to a specific
/// build (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub cert_version: String,
    pub build_meta_sha256: String,
    pub promoted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_sig: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "cert_sha256")]
    pub cert_sha256_legacy: Option<String>,
}

/// `{source_files, combined_sha256, critical_files}` (spec §3/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildMeta {
    pub source_files: BTreeMap<String, String>,
    pub combined_sha256: String,
    pub critical_files: Vec<String>,
}

/// Hex SHA-256 of a file's bytes.
pub fn sha256_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Computes build metadata over `critical_files`, each resolved relative to
/// `root`. `combined_sha256` is `sha256` of the sorted `"path:hash\n"`
/// lines (spec §6).
pub fn compute_build_metadata(root: &Path, critical_files: &[String]) -> Result<BuildMeta> {
    let mut source_files = BTreeMap::new();
    for rel in critical_files {
        let hash = sha256_file(&root.join(rel))?;
        source_files.insert(rel.clone(), hash);
    }

    let mut sorted_paths: Vec<&String> = critical_files.iter().collect();
    sorted_paths.sort();

    let mut concat = String::new();
    for path in &sorted_paths {
        let hash = &source_files[*path];
        concat.push_str(path);
        concat.push(':');
        concat.push_str(hash);
        concat.push('\n');
    }
    let combined_sha256 = hex::encode(Sha256::digest(concat.as_bytes()));

    Ok(BuildMeta {
        source_files,
        combined_sha256,
        critical_files: critical_files.to_vec(),
    })
}

/// SHA-256 over the certificate body excluding signature fields, hex
/// encoded. Recorded on `AuthorityState` as `cert_body_sha256` once binding
/// succeeds (spec §4.7 step 6).
pub fn compute_cert_body_sha256(cert_json: &Value) -> String {
    let payload = signing::cert_signing_payload(cert_json);
    let canonical = signing::canonical_json(&payload);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Verifies the certificate's cryptographic integrity (spec §4.7 step 4).
///
/// If `cert_sig` is present, verifies the Ed25519 signature against the
/// embedded public key. If absent, the certificate is rejected unless
/// `allow_legacy` is set, in which case the deprecated self-hash
/// (`cert_sha256`) is checked instead.
pub fn verify_certificate_integrity(
    cert: &Certificate,
    cert_json: &Value,
    allow_legacy: bool,
) -> Result<()> {
    match &cert.cert_sig {
        Some(sig) => {
            let public_key = signing::embedded_public_key()?;
            verify_certificate_signature(&public_key, cert_json, sig)
        }
        None => {
            if !allow_legacy {
                return Err(AuthorityError::LegacyRejected);
            }
            let expected = cert.cert_sha256_legacy.as_ref().ok_or_else(|| {
                AuthorityError::CertificateParse(
                    "legacy certificate missing cert_sha256".to_string(),
                )
            })?;
            let actual = compute_cert_body_sha256(cert_json);
            if &actual != expected {
                return Err(AuthorityError::SignatureInvalid(
                    "legacy self-hash mismatch".to_string(),
                ));
            }
            Ok(())
        }
    }
}

/// `cert.build_meta_sha256` must equal `build_meta.combined_sha256`
/// (spec §4.7 step 5).
pub fn verify_build_meta_match(cert: &Certificate, build_meta: &BuildMeta) -> Result<()> {
    if cert.build_meta_sha256 != build_meta.combined_sha256 {
        return Err(AuthorityError::BuildMetaMismatch {
            cert: cert.build_meta_sha256.clone(),
            build: build_meta.combined_sha256.clone(),
        });
    }
    Ok(())
}
