//! Bugzilla REST source.

use async_trait::async_trait;
use color_eyre::{eyre::WrapErr, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, Instrument, Span};

use super::Source;
use crate::cache::CacheOptions;
use crate::config::ModuleConfig;
use crate::http::{ClientSettings, HttpClient, Params};
use crate::item::{parse_timestamp, Item, ItemId};
use crate::registry::ModuleContext;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const INCLUDE_FIELDS: &[&str] = &[
  "id",
  "creation_time",
  "last_change_time",
  "cf_internal_whiteboard",
  "severity",
  "priority",
  "product",
  "version",
  "target_milestone",
  "target_release",
  "component",
  "assigned_to",
  "status",
  "resolution",
  "summary",
  "description",
];

#[derive(Debug, Deserialize)]
struct BugList {
  #[serde(default)]
  bugs: Vec<Bug>,
}

#[derive(Debug, Clone, Deserialize)]
struct Bug {
  id: u64,
  summary: String,
  status: String,
  last_change_time: String,
  #[serde(default)]
  priority: String,
  #[serde(default)]
  severity: String,
  #[serde(default)]
  product: String,
  #[serde(default)]
  component: String,
  #[serde(default)]
  assigned_to: String,
  #[serde(default)]
  resolution: String,
  #[serde(default)]
  target_milestone: String,
  #[serde(default)]
  cf_internal_whiteboard: String,
  #[serde(default)]
  description: String,
}

#[derive(Debug, Deserialize)]
struct BugzillaSettings {
  url: String,
  /// Each query is a map of search fields; list values repeat the field.
  #[serde(default)]
  queries: Vec<BTreeMap<String, serde_yaml::Value>>,
}

pub struct BugzillaSource {
  name: String,
  span: Span,
  http: HttpClient,
  url: String,
  api_key: Option<String>,
  queries: Vec<Params>,
}

impl BugzillaSource {
  pub const TTL: u64 = 3600;

  pub fn build(config: &ModuleConfig, ctx: &ModuleContext<'_>) -> Result<Box<dyn Source>> {
    let settings: BugzillaSettings = config.settings()?;
    let http = HttpClient::new(ctx.cache.clone(), ClientSettings::default())?;

    Ok(Box::new(Self {
      name: config.unique_name().to_string(),
      span: ctx.span.clone(),
      http,
      url: settings.url.trim_end_matches('/').to_string(),
      api_key: ctx.credentials.and_then(|c| c.api_key.clone()),
      queries: settings.queries.iter().map(query_params).collect(),
    }))
  }
}

/// Common parameters followed by the query's own.
fn request_params(api_key: Option<&str>, query: &Params) -> Params {
  let mut params: Params = INCLUDE_FIELDS
    .iter()
    .map(|field| ("include_fields".to_string(), field.to_string()))
    .collect();
  if let Some(key) = api_key {
    params.push(("api_key".to_string(), key.to_string()));
  }
  params.extend(query.iter().cloned());
  params
}

fn bug_item(source: &str, base_url: &str, bug: &Bug) -> Result<Item> {
  let tags: BTreeSet<String> = [
    bug.status.clone(),
    format!("p:{}", bug.priority),
    format!("s:{}", bug.severity),
  ]
  .into_iter()
  .collect();

  Ok(Item {
    source: source.to_string(),
    id: ItemId::Number(bug.id),
    last_update: parse_timestamp(&bug.last_change_time, TIMESTAMP_FORMAT)?,
    tags,
    summary: bug.summary.clone(),
    content: render_bug(base_url, bug),
  })
}

/// Flatten one configured query into request parameters.
fn query_params(query: &BTreeMap<String, serde_yaml::Value>) -> Params {
  let mut params = Params::new();
  for (field, value) in query {
    match value {
      serde_yaml::Value::Sequence(values) => {
        params.extend(values.iter().filter_map(scalar).map(|v| (field.clone(), v)));
      }
      other => params.extend(scalar(other).map(|v| (field.clone(), v))),
    }
  }
  params
}

fn scalar(value: &serde_yaml::Value) -> Option<String> {
  match value {
    serde_yaml::Value::String(s) => Some(s.clone()),
    serde_yaml::Value::Number(n) => Some(n.to_string()),
    serde_yaml::Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

fn render_bug(base_url: &str, bug: &Bug) -> String {
  let mut body = format!(
    "[Bug {id}]({base}/show_bug.cgi?id={id})\n\n\
     **Product:** {product} / {component}\n\
     **Status:** {status}",
    id = bug.id,
    base = base_url,
    product = bug.product,
    component = bug.component,
    status = bug.status,
  );
  if !bug.resolution.is_empty() {
    body.push_str(&format!(" {}", bug.resolution));
  }
  body.push_str(&format!("\n**Assignee:** {}\n", bug.assigned_to));
  if !bug.target_milestone.is_empty() {
    body.push_str(&format!("**Target:** {}\n", bug.target_milestone));
  }
  if !bug.cf_internal_whiteboard.is_empty() {
    body.push_str(&format!("**Whiteboard:** {}\n", bug.cf_internal_whiteboard));
  }
  if !bug.description.is_empty() {
    body.push('\n');
    body.push_str(&bug.description);
  }
  body
}

#[async_trait]
impl Source for BugzillaSource {
  fn unique_name(&self) -> &str {
    &self.name
  }

  async fn get(&self) -> Result<Vec<Item>> {
    self.fetch().instrument(self.span.clone()).await
  }
}

impl BugzillaSource {
  async fn fetch(&self) -> Result<Vec<Item>> {
    let url = format!("{}/rest/bug", self.url);
    let mut bugs = BTreeMap::new();

    for query in &self.queries {
      let value = self
        .http
        .get(
          &url,
          request_params(self.api_key.as_deref(), query),
          CacheOptions::ttl(Self::TTL),
        )
        .await?;
      let list: BugList =
        serde_json::from_value(value).wrap_err_with(|| format!("Unexpected bug list from {}", url))?;
      for bug in list.bugs {
        bugs.entry(bug.id).or_insert(bug);
      }
    }
    debug!(bugs = bugs.len(), "queried {}", self.url);

    bugs
      .values()
      .map(|bug| bug_item(&self.name, &self.url, bug))
      .collect()
  }
}
