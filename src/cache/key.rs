//! Content-addressed cache keys.

use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest identifying one cached request.
///
/// The digest covers `url + "#" + urlencoded(params)`, with parameters
/// encoded in the order they are passed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
  pub fn new(url: &str, params: &[(String, String)]) -> Self {
    // Pairs of strings always encode.
    let query = serde_urlencoded::to_string(params).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"#");
    hasher.update(query.as_bytes());
    Self(hex::encode(hasher.finalize()))
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}
