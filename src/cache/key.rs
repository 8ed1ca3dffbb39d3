//! Cache Key Module
//!
//! Deterministic key composition: `{strategy}:{identifier}:{params}` where
//! params are sorted `k=v` pairs joined by `&`. The identifier and every
//! param name and value are percent-encoded first, so separators and glob
//! characters inside them never change the key's structure. Keys longer
//! than [`MAX_KEY_LENGTH`] are replaced by a SHA-256 of the full key.

use std::borrow::Cow;
use std::fmt;

use sha2::{Digest, Sha256};

/// Longest composed key stored verbatim, in bytes.
pub const MAX_KEY_LENGTH: usize = 250;

/// Marks the hashed segment of an over-long key.
const HASH_MARKER: char = '#';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Composes the key for `(strategy, identifier, params)`.
    ///
    /// Parameter order never affects the result.
    pub fn compose(strategy: &str, identifier: &str, params: &[(&str, &str)]) -> Self {
        let identifier = escape(identifier);
        let mut sorted: Vec<(Cow<'_, str>, Cow<'_, str>)> =
            params.iter().map(|(k, v)| (escape(k), escape(v))).collect();
        sorted.sort_unstable();

        let encoded = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let full = format!("{}:{}:{}", strategy, identifier, encoded);

        if full.len() <= MAX_KEY_LENGTH {
            return CacheKey(full);
        }

        let digest = sha256_hex(full.as_bytes());
        let with_identifier = format!("{}:{}:{}{}", strategy, identifier, HASH_MARKER, digest);
        if with_identifier.len() <= MAX_KEY_LENGTH {
            CacheKey(with_identifier)
        } else {
            CacheKey(format!("{}:{}{}", strategy, HASH_MARKER, digest))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the params segment was replaced by a digest.
    pub fn is_hashed(&self) -> bool {
        self.0
            .rsplit(':')
            .next()
            .map_or(false, |last| last.len() == 65 && last.starts_with(HASH_MARKER))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Glob matching every key of `identifier` under `strategy`.
///
/// The identifier is escaped the same way [`CacheKey::compose`] escapes it,
/// so `*` or `?` in it match literally.
pub fn identifier_pattern(strategy: &str, identifier: &str) -> String {
    format!("{}:{}:*", strategy, escape(identifier))
}

/// Percent-encodes everything but unreserved characters.
fn escape(component: &str) -> Cow<'_, str> {
    urlencoding::encode(component)
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{digest:x}")
}
