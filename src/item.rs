//! Normalized upstream work items.

use chrono::{DateTime, NaiveDateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeSet;
use std::fmt;

/// Upstream-native identifier, unique within one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemId {
  Number(u64),
  Text(String),
}

impl fmt::Display for ItemId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Number(n) => write!(f, "{}", n),
      Self::Text(s) => f.write_str(s),
    }
  }
}

impl From<u64> for ItemId {
  fn from(n: u64) -> Self {
    Self::Number(n)
  }
}

impl From<&str> for ItemId {
  fn from(s: &str) -> Self {
    Self::Text(s.to_string())
  }
}

/// One bug or review, as fetched during the current poll cycle.
#[derive(Debug, Clone)]
pub struct Item {
  /// Unique name of the source instance that produced this item
  pub source: String,
  pub id: ItemId,
  /// Last upstream modification; only used to order card insertion
  pub last_update: DateTime<Utc>,
  pub tags: BTreeSet<String>,
  pub summary: String,
  /// Rendered card body
  pub content: String,
}

impl Item {
  /// Key matching this item to its card across cycles: `<source>-<id>`.
  pub fn unique_id(&self) -> String {
    format!("{}-{}", self.source, self.id)
  }
}

/// Parse an upstream timestamp that carries no zone information as UTC.
pub fn parse_timestamp(s: &str, format: &str) -> Result<DateTime<Utc>> {
  NaiveDateTime::parse_from_str(s, format)
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse timestamp '{}': {}", s, e))
}
