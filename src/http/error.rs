use reqwest::Method;
use thiserror::Error;

use crate::cache::CacheError;

/// Failures of one HTTP request.
///
/// URLs stored here are already redacted and safe to log.
#[derive(Debug, Error)]
pub enum HttpError {
  /// The request never got a response: DNS, connect, TLS, timeout.
  #[error("{method} {url}: upstream unreachable: {source}")]
  Network {
    method: Method,
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{method} {url}: response code {status}: {body}")]
  Status {
    method: Method,
    url: String,
    status: u16,
    body: String,
  },

  #[error("{method} {url}: invalid JSON body: {source}")]
  Decode {
    method: Method,
    url: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid URL {url}: {source}")]
  InvalidUrl {
    url: String,
    #[source]
    source: url::ParseError,
  },

  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error(transparent)]
  Cache(#[from] CacheError),
}
