//! In-memory credentials.
//!
//! A [`Credential`] lives only for the duration of one run. Its buffer is
//! zeroized on drop and its `Debug` output is redacted, so it can sit inside
//! structs that get logged without leaking.

use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

/// Characters the secret store or transport may wrap around a value.
const STRIPPED: [char; 4] = ['\n', '\r', '\t', ' '];

/// Remove every newline, carriage return, tab, and space from `raw`.
///
/// Applied to the whole value, not just its ends: secrets are tokens and
/// never legitimately contain these characters.
pub fn sanitize(raw: &str) -> Zeroizing<String> {
    Zeroizing::new(raw.chars().filter(|c| !STRIPPED.contains(c)).collect())
}

/// A decoded, sanitized secret value.
pub struct Credential {
    value: Zeroizing<String>,
}

impl Credential {
    pub fn new(value: Zeroizing<String>) -> Self {
        Self { value }
    }

    /// Borrow the plaintext. Keep the borrow short.
    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Credentials keyed by the environment variable they are exported as.
#[derive(Debug, Default)]
pub struct CredentialSet {
    entries: BTreeMap<String, Credential>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, env: impl Into<String>, credential: Credential) {
        self.entries.insert(env.into(), credential);
    }

    pub fn get(&self, env: &str) -> Option<&Credential> {
        self.entries.get(env)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Environment pairs for a child process.
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.expose()))
    }
}
