//! Label color selection.

use serde::Deserialize;

/// One `(substring, color)` rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelColor {
  #[serde(rename = "match")]
  pub pattern: String,
  pub color: String,
}

impl LabelColor {
  pub fn new(pattern: &str, color: &str) -> Self {
    Self {
      pattern: pattern.to_string(),
      color: color.to_string(),
    }
  }
}

/// The built-in rule table. Order matters: backport-candidate votes are
/// checked before plain negative/positive votes, votes before priorities.
pub fn default_label_colors() -> Vec<LabelColor> {
  vec![
    LabelColor::new("BC-", "orange"),
    LabelColor::new("BC+", "lime"),
    LabelColor::new("-", "red"),
    LabelColor::new("+", "green"),
    LabelColor::new("urgent", "purple"),
    LabelColor::new("high", "red"),
    LabelColor::new("medium", "orange"),
    LabelColor::new("low", "green"),
  ]
}

pub fn default_color() -> String {
  "blue".to_string()
}

/// Ordered rule table with a fallback color.
#[derive(Debug, Clone)]
pub struct LabelColors {
  rules: Vec<LabelColor>,
  fallback: String,
}

impl LabelColors {
  pub fn new(rules: Vec<LabelColor>, fallback: String) -> Self {
    Self { rules, fallback }
  }

  /// Color of the first rule whose pattern occurs in `label`.
  pub fn resolve(&self, label: &str) -> &str {
    self
      .rules
      .iter()
      .find(|rule| label.contains(&rule.pattern))
      .map(|rule| rule.color.as_str())
      .unwrap_or(&self.fallback)
  }
}

impl Default for LabelColors {
  fn default() -> Self {
    Self::new(default_label_colors(), default_color())
  }
}
