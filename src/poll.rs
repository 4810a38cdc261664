//! Poll cycles: sources → items → outputs.

use color_eyre::Result;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};

use crate::cache::CacheLayer;
use crate::config::Config;
use crate::outputs::Output;
use crate::registry::{ModuleContext, Registry};
use crate::sources::Source;

/// Outcome of one cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
  /// Sources whose items reached the outputs
  pub synced: Vec<String>,
  /// Sources that could not be built or fetched
  pub skipped: Vec<String>,
  /// Failed `set` calls
  pub failures: usize,
}

pub struct PollLoop {
  config: Config,
  cache: CacheLayer,
  sources: Registry<dyn Source>,
  outputs: Vec<Box<dyn Output>>,
  cycles: u64,
}

impl PollLoop {
  pub fn new(
    config: Config,
    cache: CacheLayer,
    sources: Registry<dyn Source>,
    outputs: Vec<Box<dyn Output>>,
  ) -> Self {
    Self {
      config,
      cache,
      sources,
      outputs,
      cycles: 0,
    }
  }

  /// Run one cycle when `interval_seconds` is negative, otherwise cycle
  /// forever with that pause in between.
  pub async fn run(&mut self, interval_seconds: i64) -> Result<()> {
    loop {
      self.run_cycle().await;
      if interval_seconds < 0 {
        return Ok(());
      }
      tokio::time::sleep(Duration::from_secs(interval_seconds as u64)).await;
    }
  }

  pub async fn run_cycle(&mut self) -> CycleReport {
    self.cycles += 1;
    let span = info_span!("cycle", n = self.cycles);
    let report = self.sync_sources().instrument(span.clone()).await;
    info!(
      parent: &span,
      synced = report.synced.len(),
      skipped = report.skipped.len(),
      failures = report.failures,
      "cycle finished"
    );
    report
  }

  async fn sync_sources(&mut self) -> CycleReport {
    let mut report = CycleReport::default();

    for module in &self.config.sources {
      let name = module.unique_name().to_string();
      let span = info_span!("source", name = %name);

      let ctx = ModuleContext {
        cache: &self.cache,
        credentials: self.config.credentials_for(module),
        board: &self.config.board,
        span: span.clone(),
      };
      let source = match self.sources.build(module, &ctx) {
        Ok(source) => source,
        Err(e) => {
          warn!(parent: &span, "skipping source: {:#}", e);
          report.skipped.push(name);
          continue;
        }
      };

      let items = match source.get().await {
        Ok(items) => items,
        Err(e) => {
          error!(parent: &span, "fetching items failed: {:?}", e);
          report.skipped.push(name);
          continue;
        }
      };
      info!(parent: &span, items = items.len(), "fetched");

      for output in self.outputs.iter_mut() {
        if let Err(e) = output.set(source.unique_name(), &items).await {
          error!(parent: &span, output = output.name(), "sync failed: {:?}", e);
          report.failures += 1;
        }
      }
      report.synced.push(name);
    }

    report
  }
}
