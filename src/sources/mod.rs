//! Upstream trackers that produce [`Item`]s.

pub mod bugzilla;
pub mod gerrit;
pub mod priority_reviews;

use async_trait::async_trait;
use color_eyre::Result;

use crate::item::Item;

#[async_trait]
pub trait Source: Send + Sync {
  /// Configured module name; also the board list the items land in.
  fn unique_name(&self) -> &str;

  /// Fetch the current item set.
  async fn get(&self) -> Result<Vec<Item>>;
}
