//! Cache layer that decides between stored payloads and network fetches.

use chrono::Utc;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{trace, warn};

use super::key::CacheKey;
use super::storage::{CacheError, CacheStorage, FileStorage, NoopStorage};
use super::types::{CacheOptions, CacheSource};

/// Cache layer shared by every HTTP client in the process.
///
/// Cloning is cheap; all clones see the same storage.
#[derive(Clone)]
pub struct CacheLayer {
  storage: Arc<dyn CacheStorage>,
}

impl CacheLayer {
  pub fn new(storage: impl CacheStorage + 'static) -> Self {
    Self {
      storage: Arc::new(storage),
    }
  }

  /// File-backed cache in `~/.cache/devboard`.
  pub fn open_default() -> Result<Self, CacheError> {
    Ok(Self::new(FileStorage::open_default()?))
  }

  /// A layer that always goes to the network.
  pub fn disabled() -> Self {
    Self::new(NoopStorage)
  }

  /// Return the payload stored under `key` if `options` allow it, otherwise
  /// run `fetcher` and store what it returns.
  ///
  /// Unreadable entries count as misses. Failing to write an entry fails the
  /// whole fetch.
  pub async fn fetch<F, Fut, E>(
    &self,
    key: &CacheKey,
    options: &CacheOptions,
    fetcher: F,
  ) -> Result<Value, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, E>>,
    E: From<CacheError>,
  {
    let (payload, source) = self.fetch_traced(key, options, fetcher).await?;
    trace!(%key, ?source, "cache fetch");
    Ok(payload)
  }

  async fn fetch_traced<F, Fut, E>(
    &self,
    key: &CacheKey,
    options: &CacheOptions,
    fetcher: F,
  ) -> Result<(Value, CacheSource), E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, E>>,
    E: From<CacheError>,
  {
    if !options.force {
      match self.storage.load(key) {
        Ok(Some(entry)) if options.is_fresh(entry.stored_at, Utc::now()) => {
          return Ok((entry.payload, CacheSource::Cache));
        }
        Ok(_) => {}
        Err(e) => warn!(%key, error = %e, "ignoring unreadable cache entry"),
      }
    }

    let payload = fetcher().await?;
    self.storage.store(key, &payload)?;
    Ok((payload, CacheSource::Network))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::fs::File;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::{Duration, SystemTime};

  #[derive(Debug)]
  struct FetchError;

  impl From<CacheError> for FetchError {
    fn from(_: CacheError) -> Self {
      FetchError
    }
  }

  struct Fixture {
    dir: tempfile::TempDir,
    layer: CacheLayer,
    calls: AtomicU32,
  }

  impl Fixture {
    fn new() -> Self {
      let dir = tempfile::tempdir().unwrap();
      let layer = CacheLayer::new(FileStorage::new(dir.path()));
      Self {
        dir,
        layer,
        calls: AtomicU32::new(0),
      }
    }

    async fn get(&self, key: &CacheKey, options: CacheOptions) -> Value {
      self
        .layer
        .fetch(key, &options, || async {
          let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
          Ok::<_, FetchError>(json!({ "call": n }))
        })
        .await
        .unwrap()
    }

    fn calls(&self) -> u32 {
      self.calls.load(Ordering::SeqCst)
    }

    /// Pretend the entry under `key` was written `age` ago.
    fn age_entry(&self, key: &CacheKey, age: Duration) {
      let path = self.dir.path().join(format!("{}.cache", key));
      let file = File::options().write(true).open(path).unwrap();
      file.set_modified(SystemTime::now() - age).unwrap();
    }
  }

  fn key() -> CacheKey {
    CacheKey::new(
      "https://bugzilla.example.com/rest/bug",
      &[("product".into(), "Foo".into())],
    )
  }

  #[tokio::test]
  async fn test_second_get_within_ttl_is_served_from_cache() {
    let fx = Fixture::new();

    let first = fx.get(&key(), CacheOptions::ttl(60)).await;
    let second = fx.get(&key(), CacheOptions::ttl(60)).await;

    assert_eq!(fx.calls(), 1);
    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn test_expired_entry_is_refetched() {
    let fx = Fixture::new();
    fx.get(&key(), CacheOptions::ttl(60)).await;
    fx.age_entry(&key(), Duration::from_secs(120));

    let payload = fx.get(&key(), CacheOptions::ttl(60)).await;

    assert_eq!(fx.calls(), 2);
    assert_eq!(payload, json!({ "call": 2 }));
  }

  #[tokio::test]
  async fn test_zero_ttl_entry_survives_any_age() {
    let fx = Fixture::new();
    fx.get(&key(), CacheOptions::ttl(0)).await;
    fx.age_entry(&key(), Duration::from_secs(400 * 24 * 3600));

    fx.get(&key(), CacheOptions::ttl(0)).await;

    assert_eq!(fx.calls(), 1);
  }

  #[tokio::test]
  async fn test_entry_older_than_not_before_is_a_miss() {
    let fx = Fixture::new();
    fx.get(&key(), CacheOptions::ttl(0)).await;
    fx.age_entry(&key(), Duration::from_secs(3600));

    let updated = Utc::now() - chrono::Duration::seconds(60);
    fx.get(&key(), CacheOptions::ttl(0).with_not_before(updated))
      .await;
    assert_eq!(fx.calls(), 2);

    // The refreshed entry is newer than the upstream change.
    fx.get(&key(), CacheOptions::ttl(0).with_not_before(updated))
      .await;
    assert_eq!(fx.calls(), 2);
  }

  #[tokio::test]
  async fn test_force_always_fetches_and_overwrites() {
    let fx = Fixture::new();
    fx.get(&key(), CacheOptions::ttl(0)).await;
    fx.get(&key(), CacheOptions::forced()).await;
    assert_eq!(fx.calls(), 2);

    let cached = fx.get(&key(), CacheOptions::ttl(0)).await;
    assert_eq!(fx.calls(), 2);
    assert_eq!(cached, json!({ "call": 2 }));
  }

  #[tokio::test]
  async fn test_corrupt_entry_is_refetched() {
    let fx = Fixture::new();
    std::fs::write(fx.dir.path().join(format!("{}.cache", key())), "garbage").unwrap();

    let payload = fx.get(&key(), CacheOptions::ttl(0)).await;

    assert_eq!(fx.calls(), 1);
    assert_eq!(payload, json!({ "call": 1 }));
  }

  #[tokio::test]
  async fn test_fetch_errors_are_not_cached() {
    let fx = Fixture::new();
    let result = fx
      .layer
      .fetch(&key(), &CacheOptions::ttl(60), || async {
        Err::<Value, _>(FetchError)
      })
      .await;
    assert!(result.is_err());

    fx.get(&key(), CacheOptions::ttl(60)).await;
    assert_eq!(fx.calls(), 1);
  }

  #[tokio::test]
  async fn test_disabled_layer_never_serves_from_cache() {
    let layer = CacheLayer::disabled();
    let calls = AtomicU32::new(0);
    for _ in 0..2 {
      layer
        .fetch(&key(), &CacheOptions::ttl(0), || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok::<_, FetchError>(json!(null))
        })
        .await
        .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
