mod board;
mod cache;
mod config;
mod error;
mod http;
mod item;
mod logging;
mod outputs;
mod poll;
mod registry;
mod sources;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::{info, info_span, warn};

use cache::{CacheLayer, FileStorage};
use config::Config;
use outputs::Output;
use registry::ModuleContext;

#[derive(Parser, Debug)]
#[command(name = "devboard")]
#[command(about = "Mirror bugs and code reviews onto a kanban board")]
#[command(version)]
struct Args {
  /// Seconds between poll cycles; negative runs a single cycle
  #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
  interval: i64,

  /// Path to config file (default: ./config.yml, then $XDG_CONFIG_HOME/devboard/config.yml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Path to auth file (default: ./auth.yml, then $XDG_CONFIG_HOME/devboard/auth.yml)
  #[arg(short, long)]
  auth: Option<PathBuf>,

  /// More logging; repeat for trace output
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,
}

fn open_cache(config: &Config) -> Result<CacheLayer> {
  if !config.cache.enabled {
    return Ok(CacheLayer::disabled());
  }
  Ok(match &config.cache.dir {
    Some(dir) => CacheLayer::new(FileStorage::new(dir)),
    None => CacheLayer::open_default()?,
  })
}

/// Build every configured output; unusable ones are logged and left out.
fn build_outputs(config: &Config, cache: &CacheLayer) -> Vec<Box<dyn Output>> {
  let registry = registry::outputs();
  config
    .outputs
    .iter()
    .filter_map(|module| {
      let ctx = ModuleContext {
        cache,
        credentials: config.credentials_for(module),
        board: &config.board,
        span: info_span!("output", name = module.unique_name()),
      };
      registry
        .build(module, &ctx)
        .map_err(|e| warn!(output = module.unique_name(), "skipping output: {:#}", e))
        .ok()
    })
    .collect()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = logging::init(args.verbose, args.log_file.as_deref())?;

  let config = Config::load(args.config.as_deref(), args.auth.as_deref())?;
  let cache = open_cache(&config)?;
  let outputs = build_outputs(&config, &cache);
  info!(
    sources = config.sources.len(),
    outputs = outputs.len(),
    interval = args.interval,
    "starting"
  );

  let mut poll = poll::PollLoop::new(config, cache, registry::sources(), outputs);
  poll.run(args.interval).await
}
