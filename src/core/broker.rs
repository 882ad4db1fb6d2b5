//! Credential broker.
//!
//! Fetches secret bundles from the vault using the machine's ambient
//! identity, then decodes and sanitizes them into [`Credential`]s.
//!
//! ## Flow
//!
//! ```text
//! SecretRef ──▶ SecretStore::fetch_bundle ──▶ base64 content
//!                                               │
//!                          decode + sanitize ◀──┘
//!                                │
//!                                ▼
//!                           Credential
//! ```
//!
//! A single attempt is made per secret. Retrying is the scheduler's job: the
//! next periodic run starts from scratch.

use base64::Engine;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::core::constants;
use crate::core::credential::{sanitize, Credential};
use crate::core::exec;
use crate::core::types::SecretRef;
use crate::error::CredentialError;

/// Source of raw secret bundles.
///
/// Implementations return the bundle's content field exactly as stored:
/// base64 text, possibly wrapped in whitespace.
pub trait SecretStore {
    fn fetch_bundle(&self, secret: &SecretRef) -> Result<String, CredentialError>;
}

/// Secret store backed by the OCI CLI (`oci secrets secret-bundle get`).
#[derive(Debug, Clone)]
pub struct OciCliSecretStore {
    binary: PathBuf,
}

impl OciCliSecretStore {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[derive(Deserialize)]
struct BundleResponse {
    data: BundleData,
}

#[derive(Deserialize)]
struct BundleData {
    #[serde(rename = "secret-bundle-content")]
    content: Option<BundleContent>,
}

#[derive(Deserialize)]
struct BundleContent {
    content: Option<String>,
}

/// Extract `data."secret-bundle-content".content` from a bundle response.
fn parse_bundle(secret: &str, body: &[u8]) -> Result<String, CredentialError> {
    let format_err = |reason: String| CredentialError::Format {
        secret: secret.to_string(),
        reason,
    };

    let response: BundleResponse = serde_json::from_slice(body)
        .map_err(|e| format_err(format!("unreadable bundle response: {}", e)))?;

    response
        .data
        .content
        .and_then(|c| c.content)
        .ok_or_else(|| format_err("bundle has no content field".to_string()))
}

impl SecretStore for OciCliSecretStore {
    fn fetch_bundle(&self, secret: &SecretRef) -> Result<String, CredentialError> {
        trace!(secret = %secret.id, auth = %secret.auth, "fetching secret bundle");

        let output = Command::new(&self.binary)
            .args(["secrets", "secret-bundle", "get", "--secret-id"])
            .arg(&secret.id)
            .args(["--auth", secret.auth.as_str()])
            .env(constants::OCI_AUTH_ENV, secret.auth.as_str())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CredentialError::Fetch {
                secret: secret.id.clone(),
                code: None,
                reason: format!("failed to run {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            return Err(CredentialError::Fetch {
                secret: secret.id.clone(),
                code: Some(exec::exit_code(output.status)),
                reason: exec::last_line(&output.stderr),
            });
        }

        // The response body carries the secret; make sure it is wiped.
        let body = Zeroizing::new(output.stdout);
        parse_bundle(&secret.id, &body)
    }
}

/// Turns secret references into credentials.
pub struct CredentialBroker<'a> {
    store: &'a dyn SecretStore,
}

impl<'a> CredentialBroker<'a> {
    pub fn new(store: &'a dyn SecretStore) -> Self {
        Self { store }
    }

    /// Fetch, decode, and sanitize one secret.
    ///
    /// # Errors
    ///
    /// `CredentialError::Fetch` when the store cannot be reached or refuses
    /// the request; `CredentialError::Format` when the content is missing,
    /// not base64, not UTF-8, or empty once sanitized.
    pub fn fetch(&self, secret: &SecretRef) -> Result<Credential, CredentialError> {
        let encoded = Zeroizing::new(self.store.fetch_bundle(secret)?);
        let credential = decode(&secret.id, &encoded)?;
        debug!(secret = %secret.id, len = credential.len(), "credential fetched");
        Ok(credential)
    }
}

/// Decode base64 bundle content into a sanitized credential.
///
/// Whitespace inside the encoded text is ignored. Nothing is returned unless
/// the whole payload decodes.
pub fn decode(secret: &str, encoded: &str) -> Result<Credential, CredentialError> {
    let format_err = |reason: &str| CredentialError::Format {
        secret: secret.to_string(),
        reason: reason.to_string(),
    };

    let compact = sanitize(encoded);
    let bytes = Zeroizing::new(
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|_| format_err("content is not valid base64"))?,
    );
    let text = std::str::from_utf8(&bytes).map_err(|_| format_err("content is not UTF-8"))?;

    let value = sanitize(text);
    if value.is_empty() {
        return Err(format_err("content is empty"));
    }
    Ok(Credential::new(value))
}
