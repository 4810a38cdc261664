//! Gerrit code review source, plus the change types and client shared with
//! the priority review source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::{eyre::WrapErr, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, Instrument, Span};

use super::Source;
use crate::cache::CacheOptions;
use crate::config::{Credentials, ModuleConfig};
use crate::http::{params, ClientSettings, HttpClient};
use crate::item::{parse_timestamp, Item, ItemId};
use crate::registry::ModuleContext;

const LIST_TTL: u64 = 30;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Vote labels turned into tags, with their short prefix.
const VOTE_LABELS: [(&str, &str); 4] = [
  ("Code-Review", "CR"),
  ("Verified", "V"),
  ("Workflow", "W"),
  ("Backport-Candidate", "BC"),
];

// ============================================================================
// API types
// ============================================================================

/// Entry of a `/changes/` query result.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeSummary {
  #[serde(rename = "_number")]
  pub number: u64,
  pub updated: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Account {
  pub name: Option<String>,
  pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vote {
  pub value: Option<i64>,
  pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelInfo {
  #[serde(default)]
  pub all: Vec<Vote>,
}

/// `/changes/<n>/detail` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeDetail {
  #[serde(rename = "_number")]
  pub number: u64,
  #[serde(default)]
  pub project: String,
  #[serde(default)]
  pub branch: String,
  #[serde(default)]
  pub status: String,
  #[serde(rename = "subject")]
  pub summary: String,
  pub updated: String,
  #[serde(default)]
  pub owner: Account,
  #[serde(default)]
  pub labels: BTreeMap<String, LabelInfo>,
}

impl ChangeDetail {
  /// Non-zero votes as `CR+2`, `V-1`, ...
  pub fn vote_tags(&self) -> BTreeSet<String> {
    VOTE_LABELS
      .iter()
      .filter_map(|(label, short)| self.labels.get(*label).map(|info| (info, short)))
      .flat_map(|(info, short)| {
        info
          .all
          .iter()
          .filter_map(|vote| vote.value)
          .filter(|value| *value != 0)
          .map(move |value| format!("{}{:+}", short, value))
      })
      .collect()
  }

  /// Code-Review votes of `user`.
  pub fn code_review_by<'a>(&'a self, user: &'a str) -> impl Iterator<Item = i64> + 'a {
    self
      .labels
      .get("Code-Review")
      .into_iter()
      .flat_map(|info| info.all.iter())
      .filter(move |vote| vote.username.as_deref() == Some(user))
      .filter_map(|vote| vote.value)
  }

  pub fn last_update(&self) -> Result<DateTime<Utc>> {
    updated_at(&self.updated)
  }
}

/// Gerrit timestamps carry nanoseconds; only the first 19 characters count.
pub fn updated_at(updated: &str) -> Result<DateTime<Utc>> {
  parse_timestamp(updated.get(..19).unwrap_or(updated), TIMESTAMP_FORMAT)
}

// ============================================================================
// Client
// ============================================================================

/// Query and detail access to one Gerrit server.
#[derive(Clone)]
pub struct GerritClient {
  http: HttpClient,
  base_url: String,
}

impl GerritClient {
  pub fn new(http: HttpClient, base_url: &str) -> Self {
    Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
    }
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Web link to a change.
  pub fn change_url(&self, number: u64) -> String {
    format!("{}/#/c/{}", self.base_url, number)
  }

  pub async fn query(&self, query: &str, limit: u32) -> Result<Vec<ChangeSummary>> {
    let url = format!("{}/changes/", self.base_url);
    let value = self
      .http
      .get(&url, params([("q", query.to_string()), ("n", limit.to_string())]), CacheOptions::ttl(LIST_TTL))
      .await?;
    serde_json::from_value(value).wrap_err_with(|| format!("Unexpected change list from {}", url))
  }

  /// Full change detail. Cached without expiry, but refetched once the
  /// change was updated after the entry was stored.
  pub async fn detail(&self, change: &ChangeSummary) -> Result<ChangeDetail> {
    let url = format!("{}/changes/{}/detail", self.base_url, change.number);
    let options = CacheOptions::ttl(0).with_not_before(updated_at(&change.updated)?);
    let value = self.http.get(&url, Vec::new(), options).await?;
    serde_json::from_value(value).wrap_err_with(|| format!("Unexpected change detail from {}", url))
  }
}

/// Markdown card body for a change.
pub fn render_change(detail: &ChangeDetail, url: &str) -> String {
  let owner = detail
    .owner
    .name
    .as_deref()
    .or(detail.owner.username.as_deref())
    .unwrap_or("unknown");
  format!(
    "[{project}#{number}]({url})\n\n\
     **Project:** {project}\n\
     **Branch:** {branch}\n\
     **Owner:** {owner}\n\
     **Status:** {status}\n",
    project = detail.project,
    number = detail.number,
    url = url,
    branch = detail.branch,
    owner = owner,
    status = detail.status,
  )
}

/// Build the item for a change, adding `extra_tags` to its vote tags.
pub fn change_item(
  source: &str,
  detail: &ChangeDetail,
  url: &str,
  extra_tags: impl IntoIterator<Item = String>,
) -> Result<Item> {
  let mut tags = detail.vote_tags();
  tags.extend(extra_tags);
  Ok(Item {
    source: source.to_string(),
    id: ItemId::Number(detail.number),
    last_update: detail.last_update()?,
    tags,
    summary: detail.summary.clone(),
    content: render_change(detail, url),
  })
}

// ============================================================================
// Source
// ============================================================================

#[derive(Debug, Deserialize)]
struct GerritQuery {
  #[serde(default)]
  filter: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GerritSettings {
  url: String,
  #[serde(default = "default_verify")]
  verify: bool,
  #[serde(default)]
  queries: Vec<GerritQuery>,
}

fn default_verify() -> bool {
  true
}

pub struct GerritSource {
  name: String,
  span: Span,
  client: GerritClient,
  queries: Vec<String>,
}

impl GerritSource {
  pub const LIST_LIMIT: u32 = 50;

  pub fn build(config: &ModuleConfig, ctx: &ModuleContext<'_>) -> Result<Box<dyn Source>> {
    let settings: GerritSettings = config.settings()?;
    let basic_auth = ctx.credentials.map(|creds: &Credentials| {
      (
        creds.username.clone().unwrap_or_default(),
        creds.password.clone().unwrap_or_default(),
      )
    });
    let http = HttpClient::new(
      ctx.cache.clone(),
      ClientSettings {
        basic_auth,
        insecure: !settings.verify,
      },
    )?;

    Ok(Box::new(Self {
      name: config.unique_name().to_string(),
      span: ctx.span.clone(),
      client: GerritClient::new(http, &settings.url),
      queries: settings.queries.iter().map(|q| q.filter.join(" ")).collect(),
    }))
  }
}

#[async_trait]
impl Source for GerritSource {
  fn unique_name(&self) -> &str {
    &self.name
  }

  async fn get(&self) -> Result<Vec<Item>> {
    self.fetch().instrument(self.span.clone()).await
  }
}

impl GerritSource {
  async fn fetch(&self) -> Result<Vec<Item>> {
    let mut changes = BTreeMap::new();
    for query in &self.queries {
      for change in self.client.query(query, Self::LIST_LIMIT).await? {
        changes.entry(change.number).or_insert(change);
      }
    }
    debug!(changes = changes.len(), "queried {}", self.client.base_url());

    let mut items = Vec::with_capacity(changes.len());
    for change in changes.values() {
      let detail = self.client.detail(change).await?;
      let url = self.client.change_url(detail.number);
      items.push(change_item(&self.name, &detail, &url, [])?);
    }
    Ok(items)
  }
}
