use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::board::labels::{default_color, default_label_colors, LabelColor, LabelColors};
use crate::error::ConfigurationError;

const CONFIG_FILE: &str = "config.yml";
const AUTH_FILE: &str = "auth.yml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub board: BoardSettings,
  #[serde(default)]
  pub sources: Vec<ModuleConfig>,
  #[serde(default)]
  pub outputs: Vec<ModuleConfig>,
  /// Entries of the separate auth file
  #[serde(skip)]
  pub auth: Vec<Credentials>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Defaults to ~/.cache/devboard
  pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      dir: None,
    }
  }
}

fn default_true() -> bool {
  true
}

/// Board-wide reconciliation settings shared by every output.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardSettings {
  /// List that receives cards whose item disappeared
  #[serde(default = "default_done_list")]
  pub done_list: String,
  #[serde(default = "default_color")]
  pub default_color: String,
  /// Ordered; the first rule whose pattern occurs in a label name wins
  #[serde(default = "default_label_colors")]
  pub label_colors: Vec<LabelColor>,
}

fn default_done_list() -> String {
  "Done".to_string()
}

impl Default for BoardSettings {
  fn default() -> Self {
    Self {
      done_list: default_done_list(),
      default_color: default_color(),
      label_colors: default_label_colors(),
    }
  }
}

impl BoardSettings {
  pub fn colors(&self) -> LabelColors {
    LabelColors::new(self.label_colors.clone(), self.default_color.clone())
  }
}

/// One entry of `sources:` or `outputs:`.
///
/// Everything besides `name`, `type` and `auth` is kept as raw YAML and
/// deserialized by the module itself through [`ModuleConfig::settings`].
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleConfig {
  pub name: Option<String>,
  #[serde(rename = "type")]
  pub kind: String,
  /// Name of the auth entry to use; defaults to the module name
  pub auth: Option<String>,
  #[serde(flatten)]
  pub settings: BTreeMap<String, serde_yaml::Value>,
}

impl ModuleConfig {
  /// Configured name, falling back to the type name.
  pub fn unique_name(&self) -> &str {
    self.name.as_deref().unwrap_or(&self.kind)
  }

  pub fn settings<T: DeserializeOwned>(&self) -> Result<T, ConfigurationError> {
    let invalid = |source| ConfigurationError::InvalidSettings {
      module: self.unique_name().to_string(),
      source,
    };
    let value = serde_yaml::to_value(&self.settings).map_err(invalid)?;
    serde_yaml::from_value(value).map_err(invalid)
  }
}

/// One entry of the auth file.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
  pub name: String,
  pub key: Option<String>,
  pub token: Option<String>,
  pub api_key: Option<String>,
  pub username: Option<String>,
  pub password: Option<String>,
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let hidden = |v: &Option<String>| v.as_ref().map(|_| "XXX");
    f.debug_struct("Credentials")
      .field("name", &self.name)
      .field("key", &hidden(&self.key))
      .field("token", &hidden(&self.token))
      .field("api_key", &hidden(&self.api_key))
      .field("username", &self.username)
      .field("password", &hidden(&self.password))
      .finish()
  }
}

impl Credentials {
  /// Look up a required field, naming the module when it is missing.
  pub fn require<'a>(
    creds: Option<&'a Credentials>,
    module: &str,
    field: &'static str,
  ) -> Result<&'a str, ConfigurationError> {
    creds
      .and_then(|c| match field {
        "key" => c.key.as_deref(),
        "token" => c.token.as_deref(),
        "api_key" => c.api_key.as_deref(),
        "username" => c.username.as_deref(),
        "password" => c.password.as_deref(),
        _ => None,
      })
      .ok_or_else(|| ConfigurationError::MissingCredential {
        module: module.to_string(),
        field,
      })
  }
}

#[derive(Debug, Default, Deserialize)]
struct AuthFile {
  #[serde(default)]
  auth: Vec<Credentials>,
}

impl Config {
  /// Load configuration and credentials.
  ///
  /// Search order for each file:
  /// 1. Explicit path if provided
  /// 2. The current directory
  /// 3. $XDG_CONFIG_HOME/devboard/
  ///
  /// The auth file is optional.
  pub fn load(explicit_path: Option<&Path>, explicit_auth: Option<&Path>) -> Result<Self> {
    let path = match explicit_path {
      Some(p) if p.exists() => p.to_path_buf(),
      Some(p) => return Err(eyre!("Config file not found: {}", p.display())),
      None => Self::find_file(CONFIG_FILE).ok_or_else(|| {
        eyre!(
          "No configuration file found. Create ./{} or ~/.config/devboard/{}",
          CONFIG_FILE,
          CONFIG_FILE
        )
      })?,
    };
    let mut config = Self::load_from_path(&path)?;

    let auth_path = match explicit_auth {
      Some(p) if p.exists() => Some(p.to_path_buf()),
      Some(p) => return Err(eyre!("Auth file not found: {}", p.display())),
      None => Self::find_file(AUTH_FILE),
    };
    if let Some(p) = auth_path {
      config.auth = load_auth(&p)?;
    }

    Ok(config)
  }

  fn find_file(name: &str) -> Option<PathBuf> {
    let local = PathBuf::from(name);
    if local.exists() {
      return Some(local);
    }

    dirs::config_dir()
      .map(|dir| dir.join("devboard").join(name))
      .filter(|p| p.exists())
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  /// Credentials for a module: the entry named by its `auth` field, else the
  /// one named like the module.
  pub fn credentials_for(&self, module: &ModuleConfig) -> Option<&Credentials> {
    let wanted = module.auth.as_deref().unwrap_or(module.unique_name());
    self.auth.iter().find(|c| c.name == wanted)
  }
}

fn load_auth(path: &Path) -> Result<Vec<Credentials>> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read auth file {}: {}", path.display(), e))?;
  let file: AuthFile = serde_yaml::from_str(&contents)
    .map_err(|e| eyre!("Failed to parse auth file {}: {}", path.display(), e))?;
  Ok(file.auth)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  const SAMPLE: &str = r#"
cache:
  enabled: false
board:
  done_list: Closed
sources:
  - name: rhbz
    type: bugzilla
    url: https://bugzilla.example.com
    queries:
      - product: Foo
        status: [NEW, ASSIGNED]
  - type: gerrit
    auth: review-creds
    url: https://review.example.com
outputs:
  - name: trello
    type: trello
    board: devboard
"#;

  #[derive(Debug, Deserialize)]
  struct UrlOnly {
    url: String,
  }

  fn sample() -> Config {
    serde_yaml::from_str(SAMPLE).unwrap()
  }

  #[test]
  fn test_parse_sample() {
    let config = sample();
    assert!(!config.cache.enabled);
    assert_eq!(config.board.done_list, "Closed");
    assert_eq!(config.board.default_color, "blue");
    assert_eq!(config.board.label_colors, default_label_colors());
    assert_eq!(config.sources.len(), 2);
    assert_eq!(config.sources[0].unique_name(), "rhbz");
    assert_eq!(config.sources[1].unique_name(), "gerrit");
    assert_eq!(config.outputs[0].kind, "trello");
  }

  #[test]
  fn test_empty_config_uses_defaults() {
    let config: Config = serde_yaml::from_str("{}").unwrap();
    assert!(config.cache.enabled);
    assert_eq!(config.board.done_list, "Done");
    assert!(config.sources.is_empty());
  }

  #[test]
  fn test_module_settings_are_typed() {
    let config = sample();
    let settings: UrlOnly = config.sources[0].settings().unwrap();
    assert_eq!(settings.url, "https://bugzilla.example.com");
    assert!(!config.sources[0].settings.contains_key("type"));

    let err = config.outputs[0].settings::<UrlOnly>().unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidSettings { ref module, .. } if module == "trello"));
  }

  #[test]
  fn test_credentials_lookup() {
    let mut config = sample();
    config.auth = vec![
      Credentials {
        name: "rhbz".into(),
        api_key: Some("secret".into()),
        ..Default::default()
      },
      Credentials {
        name: "review-creds".into(),
        username: Some("me".into()),
        ..Default::default()
      },
    ];

    let rhbz = config.credentials_for(&config.sources[0]);
    assert_eq!(Credentials::require(rhbz, "rhbz", "api_key").unwrap(), "secret");

    let gerrit = config.credentials_for(&config.sources[1]);
    assert_eq!(gerrit.and_then(|c| c.username.as_deref()), Some("me"));

    assert!(config.credentials_for(&config.outputs[0]).is_none());
    let err = Credentials::require(None, "trello", "key").unwrap_err();
    assert!(matches!(err, ConfigurationError::MissingCredential { field: "key", .. }));
  }

  #[test]
  fn test_credentials_debug_hides_secrets() {
    let creds = Credentials {
      name: "trello".into(),
      key: Some("k-123".into()),
      token: Some("t-456".into()),
      ..Default::default()
    };
    let printed = format!("{:?}", creds);
    assert!(printed.contains("trello"));
    assert!(!printed.contains("k-123"));
    assert!(!printed.contains("t-456"));
  }

  #[test]
  fn test_load_explicit_paths() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.yml");
    let auth_path = dir.path().join("auth.yml");
    std::fs::write(&config_path, SAMPLE).unwrap();
    std::fs::write(&auth_path, "auth:\n  - name: trello\n    key: k\n    token: t\n").unwrap();

    let config = Config::load(Some(&config_path), Some(&auth_path)).unwrap();
    let creds = config.credentials_for(&config.outputs[0]).unwrap();
    assert_eq!(creds.token.as_deref(), Some("t"));
  }

  #[test]
  fn test_load_missing_explicit_path_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.yml");
    assert!(Config::load(Some(&missing), None).is_err());
  }
}
