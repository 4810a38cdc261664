use async_trait::async_trait;
use color_eyre::Result;
use serde::Deserialize;
use tracing::{info, Instrument, Span};

use super::Output;
use crate::board::labels::LabelColors;
use crate::board::reconcile::Reconciler;
use crate::board::trello::{TrelloAuth, TrelloBoard};
use crate::config::{Credentials, ModuleConfig};
use crate::http::{ClientSettings, HttpClient};
use crate::item::Item;
use crate::registry::ModuleContext;

#[derive(Debug, Deserialize)]
struct TrelloSettings {
  /// Board name; created when missing
  #[serde(default = "default_board")]
  board: String,
}

fn default_board() -> String {
  "devboard".to_string()
}

/// Mirrors items onto one Trello board. The board is looked up on the first
/// `set` and kept for the lifetime of the output, together with its label
/// cache.
pub struct TrelloOutput {
  name: String,
  span: Span,
  board_name: String,
  http: HttpClient,
  auth: TrelloAuth,
  done_list: String,
  colors: LabelColors,
  reconciler: Option<Reconciler<TrelloBoard>>,
}

impl TrelloOutput {
  pub fn build(config: &ModuleConfig, ctx: &ModuleContext<'_>) -> Result<Box<dyn super::Output>> {
    let settings: TrelloSettings = config.settings()?;
    let name = config.unique_name();
    let auth = TrelloAuth {
      key: Credentials::require(ctx.credentials, name, "key")?.to_string(),
      token: Credentials::require(ctx.credentials, name, "token")?.to_string(),
    };

    Ok(Box::new(Self {
      name: name.to_string(),
      span: ctx.span.clone(),
      board_name: settings.board,
      http: HttpClient::new(ctx.cache.clone(), ClientSettings::default())?,
      auth,
      done_list: ctx.board.done_list.clone(),
      colors: ctx.board.colors(),
      reconciler: None,
    }))
  }

  async fn reconciler(&mut self) -> Result<&mut Reconciler<TrelloBoard>> {
    let reconciler = match self.reconciler.take() {
      Some(reconciler) => reconciler,
      None => {
        let board = TrelloBoard::connect(self.http.clone(), self.auth.clone(), &self.board_name).await?;
        info!(board = %self.board_name, "connected");
        Reconciler::new(board, self.done_list.clone(), self.colors.clone())
      }
    };
    Ok(self.reconciler.insert(reconciler))
  }

  async fn sync(&mut self, list_name: &str, items: &[Item]) -> Result<()> {
    let report = self.reconciler().await?.sync(list_name, items).await?;
    info!(
      list = list_name,
      created = report.created,
      updated = report.updated,
      done = report.moved_to_done,
      "synced"
    );
    Ok(())
  }
}

#[async_trait]
impl Output for TrelloOutput {
  fn name(&self) -> &str {
    &self.name
  }

  async fn set(&mut self, list_name: &str, items: &[Item]) -> Result<()> {
    let span = self.span.clone();
    self.sync(list_name, items).instrument(span).await
  }
}
