//! Board-side model and the API the reconciler drives.

pub mod labels;
pub mod reconcile;
pub mod trello;

use async_trait::async_trait;
use color_eyre::Result;

/// Attachment name carrying the owning item's unique id.
pub const MARKER_NAME: &str = "devboardId";

/// URL prefix of the marker attachment; the unique id is the last segment.
pub const MARKER_URL_PREFIX: &str = "http://devboard/";

/// A column on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardList {
  pub id: String,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
  pub id: String,
  pub name: String,
}

/// A card together with the ownership marker, if it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
  pub id: String,
  /// `None` when the card was not created by devboard
  pub unique_id: Option<String>,
  pub name: String,
  pub description: String,
  pub label_ids: Vec<String>,
}

/// Fields to change on an existing card. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardUpdate {
  pub name: Option<String>,
  pub description: Option<String>,
  pub list_id: Option<String>,
  pub to_top: bool,
}

impl CardUpdate {
  pub fn is_empty(&self) -> bool {
    self.name.is_none() && self.description.is_none() && self.list_id.is_none() && !self.to_top
  }
}

/// Build the marker URL for a unique id.
pub fn marker_url(unique_id: &str) -> String {
  format!("{}{}", MARKER_URL_PREFIX, unique_id)
}

/// Extract the unique id from a marker attachment.
pub fn parse_marker(name: &str, url: &str) -> Option<String> {
  if name != MARKER_NAME {
    return None;
  }
  url
    .rsplit('/')
    .next()
    .filter(|id| !id.is_empty())
    .map(String::from)
}

/// Operations on one remote board.
///
/// Lists and cards must be read fresh; the reconciler's decisions depend on
/// seeing its own earlier writes.
#[async_trait]
pub trait BoardApi: Send + Sync {
  async fn lists(&self) -> Result<Vec<BoardList>>;

  async fn create_list(&self, name: &str) -> Result<BoardList>;

  async fn cards(&self, list_id: &str) -> Result<Vec<Card>>;

  /// Create a card at the top of `list_id`.
  async fn create_card(&self, list_id: &str, name: &str, description: &str) -> Result<Card>;

  async fn attach_marker(&self, card_id: &str, unique_id: &str) -> Result<()>;

  async fn update_card(&self, card_id: &str, update: &CardUpdate) -> Result<()>;

  async fn labels(&self) -> Result<Vec<Label>>;

  async fn create_label(&self, name: &str, color: &str) -> Result<Label>;

  async fn add_label(&self, card_id: &str, label_id: &str) -> Result<()>;

  async fn remove_label(&self, card_id: &str, label_id: &str) -> Result<()>;
}
