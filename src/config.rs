//! Configuration loader and validator for the batch lifecycle client.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Overrides `api.token` when set.
pub const TOKEN_ENV: &str = "BATCH_API_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub api: Api,
}

/// Remote batch service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_batches_path")]
    pub batches_path: String,
}

fn default_batches_path() -> String {
    "batches".to_string()
}

impl Config {
    /// Bearer token to attach, with the environment taking precedence.
    pub fn resolved_token(&self) -> Option<String> {
        let non_blank = |t: &String| !t.trim().is_empty();
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(non_blank)
            .or_else(|| Some(self.api.token.clone()).filter(non_blank))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.api.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("api.base_url must be non-empty"));
    }
    match Url::parse(&cfg.api.base_url) {
        Ok(url) if !url.cannot_be_a_base() => {}
        _ => return Err(ConfigError::Invalid("api.base_url must be an absolute http(s) URL")),
    }
    if cfg.api.batches_path.trim_matches('/').trim().is_empty() {
        return Err(ConfigError::Invalid("api.batches_path must be non-empty"));
    }
    Ok(())
}

/// Sample configuration document.
pub fn example() -> &'static str {
    r#"api:
  base_url: "http://localhost:8080/api/"
  token: ""
  batches_path: "batches"
"#
}
