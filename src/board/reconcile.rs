//! Converge one board list onto the latest set of items.
//!
//! A sync run:
//! 1. resolves (or creates) the target list
//! 2. reads its cards, keeping only the ones carrying a devboard marker
//! 3. moves cards whose item disappeared to the terminal list
//! 4. upserts every item, oldest first, so the newest ends up on top
//! 5. brings each card's labels in line with its item's tags
//!
//! Only changed fields are written, so repeating a sync with the same items
//! performs no writes at all.

use color_eyre::Result;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

use super::labels::LabelColors;
use super::{BoardApi, BoardList, Card, CardUpdate, Label};
use crate::item::Item;

/// Longest card description written to the board, in characters.
pub const MAX_DESCRIPTION: usize = 4096;

/// Counters for one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
  pub created: usize,
  pub updated: usize,
  pub moved_to_done: usize,
  pub labels_created: usize,
  pub labels_added: usize,
  pub labels_removed: usize,
}

/// Labels known on the board, loaded once and kept for the reconciler's life.
#[derive(Debug, Default)]
struct LabelCache {
  by_name: HashMap<String, Label>,
  names: HashMap<String, String>,
}

impl LabelCache {
  fn insert(&mut self, label: Label) {
    self.names.insert(label.id.clone(), label.name.clone());
    self.by_name.entry(label.name.clone()).or_insert(label);
  }
}

pub struct Reconciler<B: BoardApi> {
  board: B,
  done_list: String,
  colors: LabelColors,
  labels: Option<LabelCache>,
}

impl<B: BoardApi> Reconciler<B> {
  pub fn new(board: B, done_list: impl Into<String>, colors: LabelColors) -> Self {
    Self {
      board,
      done_list: done_list.into(),
      colors,
      labels: None,
    }
  }

  #[cfg(test)]
  pub fn board(&self) -> &B {
    &self.board
  }

  #[cfg(test)]
  pub fn into_board(self) -> B {
    self.board
  }

  /// Make `list_name` hold exactly one marked card per item.
  #[instrument(skip(self, items), fields(items = items.len()))]
  pub async fn sync(&mut self, list_name: &str, items: &[Item]) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    let mut lists = self.board.lists().await?;
    let list = self.resolve_list(&mut lists, list_name).await?;
    let mut cards = self.owned_cards(&list.id).await?;

    let item_ids: HashSet<String> = items.iter().map(Item::unique_id).collect();
    let stale: Vec<String> = cards
      .keys()
      .filter(|id| !item_ids.contains(*id))
      .cloned()
      .collect();

    // Cards already on the terminal list have nowhere further to go.
    if !stale.is_empty() && list.name != self.done_list {
      let done_name = self.done_list.clone();
      let done = self.resolve_list(&mut lists, &done_name).await?;
      for unique_id in stale {
        if let Some(card) = cards.remove(&unique_id) {
          let update = CardUpdate {
            list_id: Some(done.id.clone()),
            to_top: true,
            ..Default::default()
          };
          self.board.update_card(&card.id, &update).await?;
          info!(%unique_id, list = %done.name, "moved card of vanished item");
          report.moved_to_done += 1;
        }
      }
    }

    // Stable sort: equal timestamps keep fetch order.
    let mut ordered: Vec<&Item> = items.iter().collect();
    ordered.sort_by_key(|item| item.last_update);

    for item in ordered {
      self.upsert(&list, &mut cards, item, &mut report).await?;
    }

    info!(
      created = report.created,
      updated = report.updated,
      moved = report.moved_to_done,
      labels_created = report.labels_created,
      labels_added = report.labels_added,
      labels_removed = report.labels_removed,
      "list synced"
    );
    Ok(report)
  }

  async fn resolve_list(&self, lists: &mut Vec<BoardList>, name: &str) -> Result<BoardList> {
    if let Some(list) = lists.iter().find(|l| l.name == name) {
      return Ok(list.clone());
    }
    let list = self.board.create_list(name).await?;
    info!(list = %name, "created list");
    lists.push(list.clone());
    Ok(list)
  }

  async fn owned_cards(&self, list_id: &str) -> Result<BTreeMap<String, Card>> {
    let mut owned = BTreeMap::new();
    for card in self.board.cards(list_id).await? {
      let Some(unique_id) = card.unique_id.clone() else {
        continue;
      };
      match owned.entry(unique_id) {
        Entry::Vacant(e) => {
          e.insert(card);
        }
        Entry::Occupied(e) => {
          warn!(unique_id = %e.key(), card = %card.id, "duplicate marker, leaving card alone");
        }
      }
    }
    Ok(owned)
  }

  async fn upsert(
    &mut self,
    list: &BoardList,
    cards: &mut BTreeMap<String, Card>,
    item: &Item,
    report: &mut SyncReport,
  ) -> Result<()> {
    let unique_id = item.unique_id();
    let description = truncate_chars(&item.content, MAX_DESCRIPTION);

    let card = match cards.entry(unique_id.clone()) {
      Entry::Occupied(e) => {
        let card = e.into_mut();
        let mut update = CardUpdate::default();
        if card.name != item.summary {
          update.name = Some(item.summary.clone());
        }
        if card.description != description {
          update.description = Some(description.to_string());
        }
        if !update.is_empty() {
          update.to_top = true;
          self.board.update_card(&card.id, &update).await?;
          debug!(%unique_id, "updated card");
          if let Some(name) = update.name {
            card.name = name;
          }
          if let Some(description) = update.description {
            card.description = description;
          }
          report.updated += 1;
        }
        card
      }
      Entry::Vacant(e) => {
        let mut card = self
          .board
          .create_card(&list.id, &item.summary, description)
          .await?;
        self.board.attach_marker(&card.id, &unique_id).await?;
        debug!(%unique_id, card = %card.id, "created card");
        card.unique_id = Some(unique_id);
        report.created += 1;
        e.insert(card)
      }
    };

    self.sync_labels(card, item, report).await
  }

  async fn sync_labels(&mut self, card: &mut Card, item: &Item, report: &mut SyncReport) -> Result<()> {
    let mut wanted = Vec::with_capacity(item.tags.len());
    for tag in &item.tags {
      wanted.push(self.label(tag, report).await?);
    }

    let (to_add, to_remove) = {
      let cache = self.label_cache().await?;
      let card_names: HashSet<&str> = card
        .label_ids
        .iter()
        .filter_map(|id| cache.names.get(id).map(String::as_str))
        .collect();
      let to_add: Vec<&Label> = wanted
        .iter()
        .filter(|label| !card_names.contains(label.name.as_str()))
        .collect();
      let to_remove: Vec<String> = card
        .label_ids
        .iter()
        .filter(|id| {
          cache
            .names
            .get(*id)
            .map_or(true, |name| !item.tags.contains(name))
        })
        .cloned()
        .collect();
      (to_add, to_remove)
    };

    for label in to_add {
      self.board.add_label(&card.id, &label.id).await?;
      card.label_ids.push(label.id.clone());
      report.labels_added += 1;
    }
    for label_id in to_remove {
      self.board.remove_label(&card.id, &label_id).await?;
      card.label_ids.retain(|id| *id != label_id);
      report.labels_removed += 1;
    }
    Ok(())
  }

  /// Labels of the board, read on first use.
  async fn label_cache(&mut self) -> Result<&mut LabelCache> {
    let cache = match self.labels.take() {
      Some(cache) => cache,
      None => {
        let mut cache = LabelCache::default();
        for label in self.board.labels().await? {
          cache.insert(label);
        }
        debug!(labels = cache.by_name.len(), "loaded board labels");
        cache
      }
    };
    Ok(self.labels.insert(cache))
  }

  /// The board label named `name`, created on first use.
  async fn label(&mut self, name: &str, report: &mut SyncReport) -> Result<Label> {
    if let Some(label) = self.label_cache().await?.by_name.get(name) {
      return Ok(label.clone());
    }

    let color = self.colors.resolve(name);
    let label = self.board.create_label(name, color).await?;
    info!(label = %name, %color, "created label");
    report.labels_created += 1;
    self.label_cache().await?.insert(label.clone());
    Ok(label)
  }
}

fn truncate_chars(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::item::tests::item;
  use async_trait::async_trait;
  use color_eyre::eyre::bail;
  use std::sync::Mutex;

  #[derive(Debug, Default)]
  struct FakeState {
    lists: Vec<BoardList>,
    /// Cards per list id, top first
    cards: HashMap<String, Vec<Card>>,
    labels: Vec<Label>,
    /// Color each label was created with
    colors: HashMap<String, String>,
    writes: Vec<String>,
    next_id: u32,
    fail_card_named: Option<String>,
  }

  impl FakeState {
    fn id(&mut self, prefix: &str) -> String {
      self.next_id += 1;
      format!("{}{}", prefix, self.next_id)
    }

    fn find_card(&mut self, card_id: &str) -> Option<(String, usize)> {
      self.cards.iter().find_map(|(list_id, cards)| {
        cards
          .iter()
          .position(|c| c.id == card_id)
          .map(|idx| (list_id.clone(), idx))
      })
    }
  }

  /// In-memory board recording every write call.
  #[derive(Debug, Default)]
  pub struct FakeBoard {
    state: Mutex<FakeState>,
  }

  impl FakeBoard {
    pub fn writes(&self) -> usize {
      self.state.lock().unwrap().writes.len()
    }

    fn list_id(&self, name: &str) -> Option<String> {
      let state = self.state.lock().unwrap();
      state.lists.iter().find(|l| l.name == name).map(|l| l.id.clone())
    }

    pub fn cards_in(&self, list_name: &str) -> Vec<Card> {
      let Some(list_id) = self.list_id(list_name) else {
        return Vec::new();
      };
      let state = self.state.lock().unwrap();
      state.cards.get(&list_id).cloned().unwrap_or_default()
    }

    pub fn card_ids_in(&self, list_name: &str) -> Vec<String> {
      self
        .cards_in(list_name)
        .into_iter()
        .filter_map(|c| c.unique_id)
        .collect()
    }

    pub fn label_names(&self, card: &Card) -> HashSet<String> {
      let state = self.state.lock().unwrap();
      card
        .label_ids
        .iter()
        .filter_map(|id| state.labels.iter().find(|l| l.id == *id))
        .map(|l| l.name.clone())
        .collect()
    }

    pub fn label_color(&self, name: &str) -> Option<String> {
      self.state.lock().unwrap().colors.get(name).cloned()
    }

    fn add_list(&self, name: &str) -> String {
      let mut state = self.state.lock().unwrap();
      let id = state.id("list");
      state.lists.push(BoardList {
        id: id.clone(),
        name: name.to_string(),
      });
      id
    }

    /// Put a card on the board without going through the reconciler.
    fn put_card(&self, list_name: &str, unique_id: Option<&str>, name: &str) -> String {
      let list_id = self.list_id(list_name).unwrap_or_else(|| self.add_list(list_name));
      let mut state = self.state.lock().unwrap();
      let id = state.id("card");
      state.cards.entry(list_id).or_default().push(Card {
        id: id.clone(),
        unique_id: unique_id.map(String::from),
        name: name.to_string(),
        description: String::new(),
        label_ids: Vec::new(),
      });
      id
    }

    fn fail_on_card(&self, name: &str) {
      self.state.lock().unwrap().fail_card_named = Some(name.to_string());
    }
  }

  #[async_trait]
  impl BoardApi for FakeBoard {
    async fn lists(&self) -> Result<Vec<BoardList>> {
      Ok(self.state.lock().unwrap().lists.clone())
    }

    async fn create_list(&self, name: &str) -> Result<BoardList> {
      let id = self.add_list(name);
      self.state.lock().unwrap().writes.push(format!("create_list {}", name));
      Ok(BoardList {
        id,
        name: name.to_string(),
      })
    }

    async fn cards(&self, list_id: &str) -> Result<Vec<Card>> {
      let state = self.state.lock().unwrap();
      Ok(state.cards.get(list_id).cloned().unwrap_or_default())
    }

    async fn create_card(&self, list_id: &str, name: &str, description: &str) -> Result<Card> {
      let mut state = self.state.lock().unwrap();
      if state.fail_card_named.as_deref() == Some(name) {
        bail!("POST https://board.example/cards: response code 500: boom");
      }
      let card = Card {
        id: state.id("card"),
        unique_id: None,
        name: name.to_string(),
        description: description.to_string(),
        label_ids: Vec::new(),
      };
      state.cards.entry(list_id.to_string()).or_default().insert(0, card.clone());
      state.writes.push(format!("create_card {}", name));
      Ok(card)
    }

    async fn attach_marker(&self, card_id: &str, unique_id: &str) -> Result<()> {
      let mut state = self.state.lock().unwrap();
      let (list_id, idx) = state.find_card(card_id).unwrap();
      state.cards.get_mut(&list_id).unwrap()[idx].unique_id = Some(unique_id.to_string());
      state.writes.push(format!("attach_marker {}", unique_id));
      Ok(())
    }

    async fn update_card(&self, card_id: &str, update: &CardUpdate) -> Result<()> {
      let mut state = self.state.lock().unwrap();
      let (list_id, idx) = state.find_card(card_id).unwrap();
      let mut card = state.cards.get_mut(&list_id).unwrap().remove(idx);
      if let Some(name) = &update.name {
        card.name = name.clone();
      }
      if let Some(description) = &update.description {
        card.description = description.clone();
      }
      let target = update.list_id.clone().unwrap_or(list_id);
      let cards = state.cards.entry(target).or_default();
      if update.to_top {
        cards.insert(0, card);
      } else {
        cards.insert(idx.min(cards.len()), card);
      }
      state.writes.push(format!("update_card {}", card_id));
      Ok(())
    }

    async fn labels(&self) -> Result<Vec<Label>> {
      Ok(self.state.lock().unwrap().labels.clone())
    }

    async fn create_label(&self, name: &str, color: &str) -> Result<Label> {
      let mut state = self.state.lock().unwrap();
      let label = Label {
        id: state.id("label"),
        name: name.to_string(),
      };
      state.labels.push(label.clone());
      state.colors.insert(name.to_string(), color.to_string());
      state.writes.push(format!("create_label {}", name));
      Ok(label)
    }

    async fn add_label(&self, card_id: &str, label_id: &str) -> Result<()> {
      let mut state = self.state.lock().unwrap();
      let (list_id, idx) = state.find_card(card_id).unwrap();
      state.cards.get_mut(&list_id).unwrap()[idx]
        .label_ids
        .push(label_id.to_string());
      state.writes.push(format!("add_label {} {}", card_id, label_id));
      Ok(())
    }

    async fn remove_label(&self, card_id: &str, label_id: &str) -> Result<()> {
      let mut state = self.state.lock().unwrap();
      let (list_id, idx) = state.find_card(card_id).unwrap();
      state.cards.get_mut(&list_id).unwrap()[idx]
        .label_ids
        .retain(|id| id != label_id);
      state.writes.push(format!("remove_label {} {}", card_id, label_id));
      Ok(())
    }
  }

  fn reconciler() -> Reconciler<FakeBoard> {
    Reconciler::new(FakeBoard::default(), "Done", LabelColors::default())
  }

  #[tokio::test]
  async fn test_new_item_creates_marked_card_with_colored_label() {
    let mut r = reconciler();
    let items = vec![item("rhbz", 1, 0, &["high"])];

    let report = r.sync("rhbz", &items).await.unwrap();

    assert_eq!(report.created, 1);
    let cards = r.board().cards_in("rhbz");
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].unique_id.as_deref(), Some("rhbz-1"));
    assert_eq!(cards[0].name, "Item 1");
    assert_eq!(cards[0].description, "Body of item 1");
    assert_eq!(r.board().label_color("high").as_deref(), Some("red"));
    assert_eq!(
      r.board().label_names(&cards[0]),
      HashSet::from(["high".to_string()])
    );
  }

  #[tokio::test]
  async fn test_second_sync_with_same_items_writes_nothing() {
    let mut r = reconciler();
    let items = vec![
      item("rhbz", 1, 0, &["NEW", "p:high"]),
      item("rhbz", 2, 5, &["ASSIGNED", "p:low", "s:urgent"]),
    ];

    r.sync("rhbz", &items).await.unwrap();
    let writes = r.board().writes();
    let report = r.sync("rhbz", &items).await.unwrap();

    assert_eq!(r.board().writes(), writes);
    assert_eq!(report, SyncReport::default());
  }

  #[tokio::test]
  async fn test_vanished_item_moves_to_done() {
    let mut r = reconciler();
    r.sync("rhbz", &[item("rhbz", 1, 0, &[]), item("rhbz", 2, 1, &[])])
      .await
      .unwrap();

    let report = r.sync("rhbz", &[item("rhbz", 2, 1, &[])]).await.unwrap();

    assert_eq!(report.moved_to_done, 1);
    assert_eq!(r.board().card_ids_in("rhbz"), vec!["rhbz-2"]);
    assert_eq!(r.board().card_ids_in("Done"), vec!["rhbz-1"]);
  }

  #[tokio::test]
  async fn test_newest_item_ends_up_on_top() {
    let mut r = reconciler();
    // Fetch order deliberately newest first.
    let items = vec![item("rhbz", 2, 10, &[]), item("rhbz", 1, 0, &[])];

    r.sync("rhbz", &items).await.unwrap();

    assert_eq!(r.board().card_ids_in("rhbz"), vec!["rhbz-2", "rhbz-1"]);
  }

  #[tokio::test]
  async fn test_equal_timestamps_keep_fetch_order() {
    let mut r = reconciler();
    let items = vec![item("rhbz", 7, 0, &[]), item("rhbz", 3, 0, &[])];

    r.sync("rhbz", &items).await.unwrap();

    // Inserted in fetch order, each on top of the previous one.
    assert_eq!(r.board().card_ids_in("rhbz"), vec!["rhbz-3", "rhbz-7"]);
  }

  #[tokio::test]
  async fn test_changed_summary_updates_and_repositions() {
    let mut r = reconciler();
    r.sync("rhbz", &[item("rhbz", 1, 0, &[]), item("rhbz", 2, 1, &[])])
      .await
      .unwrap();

    let mut renamed = item("rhbz", 1, 0, &[]);
    renamed.summary = "Crash on startup".into();
    let report = r
      .sync("rhbz", &[renamed, item("rhbz", 2, 1, &[])])
      .await
      .unwrap();

    assert_eq!(report.updated, 1);
    let cards = r.board().cards_in("rhbz");
    assert_eq!(cards[0].unique_id.as_deref(), Some("rhbz-1"));
    assert_eq!(cards[0].name, "Crash on startup");
  }

  #[tokio::test]
  async fn test_labels_follow_tags() {
    let mut r = reconciler();
    r.sync("reviews", &[item("reviews", 9, 0, &["CR+1", "V+1"])])
      .await
      .unwrap();

    let report = r
      .sync("reviews", &[item("reviews", 9, 0, &["CR+2", "V+1"])])
      .await
      .unwrap();

    assert_eq!(report.labels_added, 1);
    assert_eq!(report.labels_removed, 1);
    let card = &r.board().cards_in("reviews")[0];
    assert_eq!(
      r.board().label_names(card),
      HashSet::from(["CR+2".to_string(), "V+1".to_string()])
    );
  }

  #[tokio::test]
  async fn test_labels_are_created_once_per_board() {
    let mut r = reconciler();
    let items = vec![item("rhbz", 1, 0, &["NEW"]), item("rhbz", 2, 1, &["NEW"])];

    let report = r.sync("rhbz", &items).await.unwrap();

    assert_eq!(report.labels_created, 1);
    assert_eq!(report.labels_added, 2);
  }

  #[tokio::test]
  async fn test_existing_board_label_is_reused_by_name() {
    let board = FakeBoard::default();
    board.state.lock().unwrap().labels.push(Label {
      id: "preexisting".into(),
      name: "NEW".into(),
    });
    let mut r = Reconciler::new(board, "Done", LabelColors::default());

    let report = r.sync("rhbz", &[item("rhbz", 1, 0, &["NEW"])]).await.unwrap();

    assert_eq!(report.labels_created, 0);
    assert_eq!(r.board().cards_in("rhbz")[0].label_ids, vec!["preexisting"]);
  }

  #[tokio::test]
  async fn test_untagged_first_item_still_loads_board_labels() {
    let board = FakeBoard::default();
    board.state.lock().unwrap().labels.push(Label {
      id: "preexisting".into(),
      name: "high".into(),
    });
    let items = vec![item("rhbz", 1, 0, &[]), item("rhbz", 2, 5, &["high"])];

    let mut r = Reconciler::new(board, "Done", LabelColors::default());
    let report = r.sync("rhbz", &items).await.unwrap();
    assert_eq!(report.labels_created, 0);
    assert_eq!(r.board().cards_in("rhbz")[0].label_ids, vec!["preexisting"]);

    // A restarted process starts with an empty label cache.
    let board = r.into_board();
    let writes = board.writes();
    let mut restarted = Reconciler::new(board, "Done", LabelColors::default());
    let report = restarted.sync("rhbz", &items).await.unwrap();

    assert_eq!(report, SyncReport::default());
    assert_eq!(restarted.board().writes(), writes);
  }

  #[tokio::test]
  async fn test_syncing_the_done_list_moves_nothing() {
    let mut r = reconciler();
    r.sync("Done", &[item("rhbz", 1, 0, &[])]).await.unwrap();
    let writes = r.board().writes();

    let report = r.sync("Done", &[]).await.unwrap();

    assert_eq!(report.moved_to_done, 0);
    assert_eq!(r.board().writes(), writes);
    assert_eq!(r.board().card_ids_in("Done"), vec!["rhbz-1"]);
  }

  #[tokio::test]
  async fn test_unmarked_cards_are_never_touched() {
    let mut r = reconciler();
    let manual = r.board().put_card("rhbz", None, "Written by a human");

    r.sync("rhbz", &[]).await.unwrap();
    r.sync("rhbz", &[item("rhbz", 1, 0, &[])]).await.unwrap();

    let cards = r.board().cards_in("rhbz");
    assert!(cards.iter().any(|c| c.id == manual && c.name == "Written by a human"));
    assert!(r.board().cards_in("Done").is_empty());
  }

  #[tokio::test]
  async fn test_board_converges_to_item_set() {
    let mut r = reconciler();
    r.board().put_card("rhbz", Some("rhbz-100"), "Left over");
    r.board().put_card("rhbz", Some("rhbz-1"), "Old name");
    let items = vec![
      item("rhbz", 1, 3, &["a"]),
      item("rhbz", 2, 2, &["b"]),
      item("rhbz", 3, 1, &["c", "d"]),
    ];

    r.sync("rhbz", &items).await.unwrap();

    let mut on_list = r.board().card_ids_in("rhbz");
    on_list.sort();
    assert_eq!(on_list, vec!["rhbz-1", "rhbz-2", "rhbz-3"]);
    assert_eq!(r.board().card_ids_in("Done"), vec!["rhbz-100"]);
    for card in r.board().cards_in("rhbz") {
      let item = items
        .iter()
        .find(|i| Some(i.unique_id()) == card.unique_id)
        .unwrap();
      assert_eq!(
        r.board().label_names(&card),
        item.tags.iter().cloned().collect::<HashSet<_>>()
      );
    }
  }

  #[tokio::test]
  async fn test_done_list_is_configurable() {
    let mut r = Reconciler::new(FakeBoard::default(), "Archive", LabelColors::default());
    r.sync("rhbz", &[item("rhbz", 1, 0, &[])]).await.unwrap();
    r.sync("rhbz", &[]).await.unwrap();

    assert_eq!(r.board().card_ids_in("Archive"), vec!["rhbz-1"]);
    assert!(r.board().cards_in("Done").is_empty());
  }

  #[tokio::test]
  async fn test_long_content_is_truncated() {
    let mut r = reconciler();
    let mut long = item("rhbz", 1, 0, &[]);
    long.content = "é".repeat(MAX_DESCRIPTION + 10);

    r.sync("rhbz", &[long.clone()]).await.unwrap();
    let writes = r.board().writes();
    r.sync("rhbz", &[long]).await.unwrap();

    let card = &r.board().cards_in("rhbz")[0];
    assert_eq!(card.description.chars().count(), MAX_DESCRIPTION);
    assert_eq!(r.board().writes(), writes);
  }

  #[tokio::test]
  async fn test_repeated_unique_id_in_one_batch_makes_one_card() {
    let mut r = reconciler();
    let items = vec![item("rhbz", 1, 0, &[]), item("rhbz", 1, 1, &[])];

    let report = r.sync("rhbz", &items).await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(r.board().cards_in("rhbz").len(), 1);
  }

  #[tokio::test]
  async fn test_failure_keeps_earlier_upserts() {
    let mut r = reconciler();
    r.board().fail_on_card("Item 2");
    let items = vec![item("rhbz", 1, 0, &[]), item("rhbz", 2, 1, &[]), item("rhbz", 3, 2, &[])];

    let err = r.sync("rhbz", &items).await.unwrap_err();

    assert!(err.to_string().contains("response code 500"));
    assert_eq!(r.board().card_ids_in("rhbz"), vec!["rhbz-1"]);
  }
}
