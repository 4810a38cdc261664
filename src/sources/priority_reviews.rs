//! Reviews curated on an etherpad, resolved against the Gerrit servers the
//! pad links to.
//!
//! The pad is read top to bottom. A line `* <Tag> Priority Reviews:` opens a
//! section whose links get `<Tag>` as an extra tag; any other bullet line ends
//! the list.

use async_trait::async_trait;
use color_eyre::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn, Instrument, Span};

use super::gerrit::{change_item, ChangeDetail, GerritClient};
use super::Source;
use crate::cache::CacheOptions;
use crate::config::ModuleConfig;
use crate::http::{ClientSettings, HttpClient};
use crate::item::Item;
use crate::registry::ModuleContext;

const DEFAULT_PAD: &str = "https://etherpad.openstack.org/p/octavia-priority-reviews/export/txt";
const PAD_TTL: u64 = 3600;
const QUERY_LIMIT: u32 = 100;
const SECTION_SUFFIX: &str = " Priority Reviews:";

lazy_static! {
  static ref REVIEW_LINK: Regex =
    Regex::new(r"(?P<base>https?://[^/\s]+)(/#/c)?/(?P<id>[0-9]+)/?(\s|$)").unwrap();
}

/// Change number → section tag, per Gerrit base URL.
pub type PadReviews = BTreeMap<String, BTreeMap<u64, Option<String>>>;

/// Collect the review links of a pad export.
pub fn parse_pad(text: &str) -> PadReviews {
  let mut reviews = PadReviews::new();
  let mut section: Option<String> = None;

  for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
    if let Some(bullet) = line.strip_prefix('*') {
      match bullet.strip_suffix(SECTION_SUFFIX) {
        Some(title) => {
          section = title.split_whitespace().next().map(String::from);
        }
        None => break,
      }
      continue;
    }

    let Some(caps) = REVIEW_LINK.captures(line) else {
      continue;
    };
    let Ok(id) = caps["id"].parse::<u64>() else {
      continue;
    };
    reviews
      .entry(caps["base"].to_string())
      .or_default()
      .insert(id, section.clone());
  }

  reviews
}

/// Whether `user` still has to look at a change: not their own, and no
/// non-zero Code-Review vote from them yet.
pub fn needs_review(detail: &ChangeDetail, user: Option<&str>) -> bool {
  let Some(user) = user else {
    return true;
  };
  if detail.owner.username.as_deref() == Some(user) {
    return false;
  }
  detail.code_review_by(user).all(|value| value == 0)
}

fn extra_tags(detail: &ChangeDetail, section: Option<&String>) -> Vec<String> {
  let mut tags: Vec<String> = section.cloned().into_iter().collect();
  if !detail.branch.is_empty() && detail.branch != "master" {
    tags.push("backport".to_string());
  }
  tags
}

#[derive(Debug, Deserialize)]
struct PrioritySettings {
  #[serde(default = "default_pad")]
  url: String,
  username: Option<String>,
}

fn default_pad() -> String {
  DEFAULT_PAD.to_string()
}

pub struct PriorityReviewsSource {
  name: String,
  span: Span,
  http: HttpClient,
  pad_url: String,
  user: Option<String>,
}

impl PriorityReviewsSource {
  pub fn build(config: &ModuleConfig, ctx: &ModuleContext<'_>) -> Result<Box<dyn Source>> {
    let settings: PrioritySettings = config.settings()?;
    let user = settings
      .username
      .or_else(|| ctx.credentials.and_then(|c| c.username.clone()));
    if user.is_none() {
      warn!(parent: &ctx.span, "no username configured, keeping every review");
    }

    Ok(Box::new(Self {
      name: config.unique_name().to_string(),
      span: ctx.span.clone(),
      http: HttpClient::new(ctx.cache.clone(), ClientSettings::default())?,
      pad_url: settings.url,
      user,
    }))
  }

  async fn pad(&self) -> Result<String> {
    let value = self
      .http
      .get(&self.pad_url, Vec::new(), CacheOptions::ttl(PAD_TTL))
      .await?;
    Ok(match value {
      Value::String(text) => text,
      other => other.to_string(),
    })
  }
}

#[async_trait]
impl Source for PriorityReviewsSource {
  fn unique_name(&self) -> &str {
    &self.name
  }

  async fn get(&self) -> Result<Vec<Item>> {
    self.fetch().instrument(self.span.clone()).await
  }
}

impl PriorityReviewsSource {
  async fn fetch(&self) -> Result<Vec<Item>> {
    let reviews = parse_pad(&self.pad().await?);
    let mut items = Vec::new();

    for (base, sections) in &reviews {
      let client = GerritClient::new(self.http.clone(), base);
      let query = sections
        .keys()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(" OR ");
      let changes = client.query(&query, QUERY_LIMIT).await?;
      debug!(changes = changes.len(), linked = sections.len(), "queried {}", base);

      for change in &changes {
        let detail = client.detail(change).await?;
        if !needs_review(&detail, self.user.as_deref()) {
          continue;
        }
        let section = sections.get(&detail.number).and_then(Option::as_ref);
        let url = client.change_url(detail.number);
        items.push(change_item(&self.name, &detail, &url, extra_tags(&detail, section))?);
      }
    }

    Ok(items)
  }
}
