//! Trello REST client implementing [`BoardApi`].

use async_trait::async_trait;
use color_eyre::{eyre::WrapErr, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{marker_url, parse_marker, BoardApi, BoardList, Card, CardUpdate, Label, MARKER_NAME};
use crate::cache::CacheOptions;
use crate::http::{params, HttpClient, Params};

const BASE_URL: &str = "https://api.trello.com/1";

/// Boards and labels change rarely; a short TTL spares repeated lookups.
const METADATA_TTL: u64 = 10;

#[derive(Debug, Deserialize)]
struct ApiBoard {
  id: String,
  name: String,
}

#[derive(Debug, Deserialize)]
struct ApiList {
  id: String,
  name: String,
}

#[derive(Debug, Deserialize)]
struct ApiLabel {
  id: String,
  #[serde(default)]
  name: String,
}

#[derive(Debug, Deserialize)]
struct ApiAttachment {
  #[serde(default)]
  name: String,
  #[serde(default)]
  url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCard {
  id: String,
  name: String,
  #[serde(default)]
  desc: String,
  #[serde(default)]
  id_labels: Vec<String>,
  #[serde(default)]
  attachments: Vec<ApiAttachment>,
}

impl From<ApiCard> for Card {
  fn from(card: ApiCard) -> Self {
    let unique_id = card
      .attachments
      .iter()
      .find_map(|a| parse_marker(&a.name, &a.url));
    Card {
      id: card.id,
      unique_id,
      name: card.name,
      description: card.desc,
      label_ids: card.id_labels,
    }
  }
}

impl From<ApiLabel> for Label {
  fn from(label: ApiLabel) -> Self {
    Label {
      id: label.id,
      name: label.name,
    }
  }
}

impl From<ApiList> for BoardList {
  fn from(list: ApiList) -> Self {
    BoardList {
      id: list.id,
      name: list.name,
    }
  }
}

fn parse<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
  serde_json::from_value(value).wrap_err_with(|| format!("Unexpected Trello {} payload", what))
}

/// API key and token, sent as query parameters on every call.
#[derive(Clone)]
pub struct TrelloAuth {
  pub key: String,
  pub token: String,
}

/// One Trello board, addressed by id.
pub struct TrelloBoard {
  http: HttpClient,
  auth: TrelloAuth,
  board_id: String,
}

impl TrelloBoard {
  /// Open the board named `name`, creating it when the member has none.
  pub async fn connect(http: HttpClient, auth: TrelloAuth, name: &str) -> Result<Self> {
    let url = format!("{}/members/me/boards", BASE_URL);
    let boards: Vec<ApiBoard> = parse(
      http
        .get(&url, auth_params::<&str, &str>(&auth, []), CacheOptions::ttl(METADATA_TTL))
        .await?,
      "boards",
    )?;

    let board_id = match boards.into_iter().find(|b| b.name == name) {
      Some(board) => board.id,
      None => {
        let created: ApiBoard = parse(
          http
            .post(&format!("{}/boards/", BASE_URL), auth_params(&auth, new_board_params(name)))
            .await?,
          "board",
        )?;
        info!(board = %created.name, "created board");
        created.id
      }
    };

    Ok(Self {
      http,
      auth,
      board_id,
    })
  }

  fn params<K: ToString, V: ToString>(&self, extra: impl IntoIterator<Item = (K, V)>) -> Params {
    auth_params(&self.auth, extra)
  }
}

fn auth_params<K: ToString, V: ToString>(auth: &TrelloAuth, extra: impl IntoIterator<Item = (K, V)>) -> Params {
  let mut p = params(extra);
  p.push(("key".into(), auth.key.clone()));
  p.push(("token".into(), auth.token.clone()));
  p
}

fn new_board_params(name: &str) -> Vec<(&'static str, String)> {
  let fixed = [
    ("defaultLabels", "false"),
    ("defaultLists", "false"),
    ("keepFromSource", "none"),
    ("prefs_permissionLevel", "private"),
    ("prefs_voting", "disabled"),
    ("prefs_comments", "members"),
    ("prefs_invitations", "members"),
    ("prefs_selfJoin", "false"),
    ("prefs_cardCovers", "true"),
    ("prefs_background", "blue"),
    ("prefs_cardAging", "regular"),
  ];
  std::iter::once(("name", name.to_string()))
    .chain(fixed.into_iter().map(|(k, v)| (k, v.to_string())))
    .collect()
}

fn update_params(update: &CardUpdate) -> Vec<(&'static str, String)> {
  let mut p = Vec::new();
  if let Some(name) = &update.name {
    p.push(("name", name.clone()));
  }
  if let Some(description) = &update.description {
    p.push(("desc", description.clone()));
  }
  if let Some(list_id) = &update.list_id {
    p.push(("idList", list_id.clone()));
  }
  if update.to_top {
    p.push(("pos", "top".to_string()));
  }
  p
}

#[async_trait]
impl BoardApi for TrelloBoard {
  async fn lists(&self) -> Result<Vec<BoardList>> {
    let url = format!("{}/board/{}/lists", BASE_URL, self.board_id);
    let lists: Vec<ApiList> = parse(
      self
        .http
        .get(&url, self.params::<&str, &str>([]), CacheOptions::forced())
        .await?,
      "lists",
    )?;
    Ok(lists.into_iter().map(BoardList::from).collect())
  }

  async fn create_list(&self, name: &str) -> Result<BoardList> {
    let url = format!("{}/lists", BASE_URL);
    let list: ApiList = parse(
      self
        .http
        .post(&url, self.params([("name", name), ("idBoard", self.board_id.as_str())]))
        .await?,
      "list",
    )?;
    Ok(list.into())
  }

  async fn cards(&self, list_id: &str) -> Result<Vec<Card>> {
    let url = format!("{}/list/{}/cards", BASE_URL, list_id);
    let cards: Vec<ApiCard> = parse(
      self
        .http
        .get(&url, self.params([("attachments", "true")]), CacheOptions::forced())
        .await?,
      "cards",
    )?;
    Ok(cards.into_iter().map(Card::from).collect())
  }

  async fn create_card(&self, list_id: &str, name: &str, description: &str) -> Result<Card> {
    let url = format!("{}/cards", BASE_URL);
    let card: ApiCard = parse(
      self
        .http
        .post(
          &url,
          self.params([("name", name), ("desc", description), ("pos", "top"), ("idList", list_id)]),
        )
        .await?,
      "card",
    )?;
    Ok(card.into())
  }

  async fn attach_marker(&self, card_id: &str, unique_id: &str) -> Result<()> {
    let url = format!("{}/cards/{}/attachments", BASE_URL, card_id);
    let marker = marker_url(unique_id);
    self
      .http
      .post(&url, self.params([("name", MARKER_NAME), ("url", marker.as_str())]))
      .await?;
    Ok(())
  }

  async fn update_card(&self, card_id: &str, update: &CardUpdate) -> Result<()> {
    let url = format!("{}/cards/{}", BASE_URL, card_id);
    self.http.put(&url, self.params(update_params(update))).await?;
    Ok(())
  }

  async fn labels(&self) -> Result<Vec<Label>> {
    let url = format!("{}/board/{}/labels", BASE_URL, self.board_id);
    let labels: Vec<ApiLabel> = parse(
      self
        .http
        .get(&url, self.params::<&str, &str>([]), CacheOptions::ttl(METADATA_TTL))
        .await?,
      "labels",
    )?;
    Ok(labels.into_iter().map(Label::from).collect())
  }

  async fn create_label(&self, name: &str, color: &str) -> Result<Label> {
    let url = format!("{}/labels", BASE_URL);
    let label: ApiLabel = parse(
      self
        .http
        .post(
          &url,
          self.params([("name", name), ("idBoard", self.board_id.as_str()), ("color", color)]),
        )
        .await?,
      "label",
    )?;
    Ok(label.into())
  }

  async fn add_label(&self, card_id: &str, label_id: &str) -> Result<()> {
    let url = format!("{}/cards/{}/idLabels", BASE_URL, card_id);
    self.http.post(&url, self.params([("value", label_id)])).await?;
    Ok(())
  }

  async fn remove_label(&self, card_id: &str, label_id: &str) -> Result<()> {
    let url = format!("{}/cards/{}/idLabels/{}", BASE_URL, card_id, label_id);
    self.http.delete(&url, self.params::<&str, &str>([])).await?;
    Ok(())
  }
}
