//! HTTP access layer shared by sources and outputs.
//!
//! All four verbs go through [`HttpClient::request`]. Only GET is looked up
//! in the response cache.

mod error;
mod response;

pub use error::HttpError;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::cache::{CacheKey, CacheLayer, CacheOptions};
use response::{decode_body, redact_url, truncate_error_body};

const USER_AGENT: &str = concat!("devboard/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(30);

/// Query parameters, in the order they are sent.
pub type Params = Vec<(String, String)>;

/// Build [`Params`] from borrowed pairs.
pub fn params<K: ToString, V: ToString>(pairs: impl IntoIterator<Item = (K, V)>) -> Params {
  pairs
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Per-client connection settings.
#[derive(Clone, Default)]
pub struct ClientSettings {
  pub basic_auth: Option<(String, String)>,
  /// Accept invalid TLS certificates.
  pub insecure: bool,
}

/// HTTP client wrapper that classifies failures and caches GETs.
#[derive(Clone)]
pub struct HttpClient {
  client: Client,
  cache: CacheLayer,
  basic_auth: Option<(String, String)>,
}

impl HttpClient {
  pub fn new(cache: CacheLayer, settings: ClientSettings) -> Result<Self, HttpError> {
    let client = Client::builder()
      .timeout(TIMEOUT)
      .user_agent(USER_AGENT)
      .danger_accept_invalid_certs(settings.insecure)
      .build()
      .map_err(HttpError::Client)?;

    Ok(Self {
      client,
      cache,
      basic_auth: settings.basic_auth,
    })
  }

  pub async fn get(&self, url: &str, params: Params, cache: CacheOptions) -> Result<Value, HttpError> {
    self.request(Method::GET, url, params, Some(cache)).await
  }

  pub async fn post(&self, url: &str, params: Params) -> Result<Value, HttpError> {
    self.request(Method::POST, url, params, None).await
  }

  pub async fn put(&self, url: &str, params: Params) -> Result<Value, HttpError> {
    self.request(Method::PUT, url, params, None).await
  }

  pub async fn delete(&self, url: &str, params: Params) -> Result<Value, HttpError> {
    self.request(Method::DELETE, url, params, None).await
  }

  /// Perform one request. `cache` is honoured for GET only.
  pub async fn request(
    &self,
    method: Method,
    url: &str,
    params: Params,
    cache: Option<CacheOptions>,
  ) -> Result<Value, HttpError> {
    match cache {
      Some(options) if method == Method::GET => {
        let key = CacheKey::new(url, &params);
        self
          .cache
          .fetch(&key, &options, || self.send(method, url, &params))
          .await
      }
      _ => self.send(method, url, &params).await,
    }
  }

  async fn send(&self, method: Method, url: &str, params: &[(String, String)]) -> Result<Value, HttpError> {
    let full_url = if params.is_empty() {
      Url::parse(url)
    } else {
      Url::parse_with_params(url, params)
    }
    .map_err(|source| HttpError::InvalidUrl {
      url: redact_url(url),
      source,
    })?;
    let log_url = redact_url(full_url.as_str());

    debug!("{} {}", method, log_url);

    let mut request = self.client.request(method.clone(), full_url);
    if let Some((user, password)) = &self.basic_auth {
      request = request.basic_auth(user, Some(password));
    }

    let network = |source| HttpError::Network {
      method: method.clone(),
      url: log_url.clone(),
      source,
    };

    let response = request.send().await.map_err(network)?;
    let status = response.status();
    debug!("returned {}", status.as_u16());

    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let text = response.text().await.map_err(network)?;

    if status.as_u16() >= 400 {
      return Err(HttpError::Status {
        method,
        url: log_url,
        status: status.as_u16(),
        body: truncate_error_body(&text),
      });
    }

    decode_body(content_type.as_deref(), text).map_err(|source| HttpError::Decode {
      method,
      url: log_url,
      source,
    })
  }
}
