use thiserror::Error;

/// A configured module that cannot be built.
#[derive(Debug, Error)]
pub enum ConfigurationError {
  #[error("unknown {kind} type '{name}'")]
  UnknownModule { kind: &'static str, name: String },

  #[error("invalid settings for '{module}': {source}")]
  InvalidSettings {
    module: String,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("'{module}' needs credential '{field}' in the auth file")]
  MissingCredential { module: String, field: &'static str },
}
