//! Type name → constructor tables for sources and outputs.

use color_eyre::Result;
use std::collections::BTreeMap;
use tracing::Span;

use crate::cache::CacheLayer;
use crate::config::{BoardSettings, Credentials, ModuleConfig};
use crate::error::ConfigurationError;
use crate::outputs::{trello::TrelloOutput, Output};
use crate::sources::{
  bugzilla::BugzillaSource, gerrit::GerritSource, priority_reviews::PriorityReviewsSource, Source,
};

/// Shared state handed to every module constructor.
pub struct ModuleContext<'a> {
  pub cache: &'a CacheLayer,
  pub credentials: Option<&'a Credentials>,
  pub board: &'a BoardSettings,
  /// Span the module runs its work in
  pub span: Span,
}

pub type Factory<T> = fn(&ModuleConfig, &ModuleContext<'_>) -> Result<Box<T>>;

pub struct Registry<T: ?Sized> {
  kind: &'static str,
  factories: BTreeMap<&'static str, Factory<T>>,
}

impl<T: ?Sized> Registry<T> {
  pub fn new(kind: &'static str) -> Self {
    Self {
      kind,
      factories: BTreeMap::new(),
    }
  }

  pub fn register(&mut self, type_name: &'static str, factory: Factory<T>) -> &mut Self {
    self.factories.insert(type_name, factory);
    self
  }

  #[cfg(test)]
  pub fn contains(&self, type_name: &str) -> bool {
    self.factories.contains_key(type_name)
  }

  /// Construct the module described by `config`.
  pub fn build(&self, config: &ModuleConfig, ctx: &ModuleContext<'_>) -> Result<Box<T>> {
    let factory = self
      .factories
      .get(config.kind.as_str())
      .ok_or_else(|| ConfigurationError::UnknownModule {
        kind: self.kind,
        name: config.kind.clone(),
      })?;
    factory(config, ctx)
  }
}

/// Built-in sources.
pub fn sources() -> Registry<dyn Source> {
  let mut registry: Registry<dyn Source> = Registry::new("source");
  registry
    .register("bugzilla", BugzillaSource::build)
    .register("gerrit", GerritSource::build)
    .register("priority-reviews", PriorityReviewsSource::build)
    .register("octavia-priority-reviews", PriorityReviewsSource::build);
  registry
}

/// Built-in outputs.
pub fn outputs() -> Registry<dyn Output> {
  let mut registry: Registry<dyn Output> = Registry::new("output");
  registry.register("trello", TrelloOutput::build);
  registry
}
