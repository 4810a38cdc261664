//! Core types for the response cache.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// Per-request cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
  /// Seconds an entry stays valid by age. Zero means it never expires by age.
  pub ttl: u64,
  /// Entries stored before this instant are misses, whatever their age.
  pub not_before: Option<DateTime<Utc>>,
  /// Skip the lookup, always fetch and overwrite.
  pub force: bool,
}

impl CacheOptions {
  pub fn ttl(ttl: u64) -> Self {
    Self {
      ttl,
      not_before: None,
      force: false,
    }
  }

  /// Always go to the network, but keep the entry up to date.
  pub fn forced() -> Self {
    Self {
      force: true,
      ..Self::ttl(0)
    }
  }

  pub fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
    self.not_before = Some(not_before);
    self
  }

  /// Whether an entry stored at `stored_at` may still be served at `now`.
  pub fn is_fresh(&self, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    if let Some(not_before) = self.not_before {
      if stored_at < not_before {
        return false;
      }
    }
    if self.ttl == 0 {
      return true;
    }
    let expires = i64::try_from(self.ttl)
      .ok()
      .and_then(Duration::try_seconds)
      .and_then(|ttl| stored_at.checked_add_signed(ttl));
    // A TTL past the representable range never expires.
    expires.map_or(true, |expires| expires >= now)
  }
}

/// A payload read back from storage.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub payload: Value,
  pub stored_at: DateTime<Utc>,
}

/// Where a fetched payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  Network,
  Cache,
}
