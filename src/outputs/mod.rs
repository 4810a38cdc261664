//! Boards that mirror source items.

pub mod trello;

use async_trait::async_trait;
use color_eyre::Result;

use crate::item::Item;

#[async_trait]
pub trait Output: Send {
  fn name(&self) -> &str;

  /// Make the list `list_name` show exactly `items`.
  async fn set(&mut self, list_name: &str, items: &[Item]) -> Result<()>;
}
