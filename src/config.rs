//! Configuration loader and validator for journal-shelf.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

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
    pub app: App,
    pub store: Store,
    pub ai: Ai,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub catalog_path: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_locale")]
    pub locale: String,
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    pub database_url: String,
    pub owner: String,
}

/// Generative-AI service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ai {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_page_size() -> usize {
    20
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_timeout() -> u64 {
    60
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// `DATABASE_URL` wins over the configured URL.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.store.database_url.clone())
    }

    /// `SHELF_AI_API_KEY` wins over the configured key.
    pub fn ai_api_key(&self) -> String {
        std::env::var("SHELF_AI_API_KEY").unwrap_or_else(|_| self.ai.api_key.clone())
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
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.catalog_path.trim().is_empty() {
        return Err(ConfigError::Invalid("app.catalog_path must be non-empty"));
    }
    if cfg.app.page_size == 0 {
        return Err(ConfigError::Invalid("app.page_size must be > 0"));
    }
    if cfg.app.locale.trim().is_empty() {
        return Err(ConfigError::Invalid("app.locale must be non-empty"));
    }

    if cfg.store.database_url.trim().is_empty() {
        return Err(ConfigError::Invalid("store.database_url must be non-empty"));
    }
    if cfg.store.owner.trim().is_empty() || cfg.store.owner.contains('/') {
        return Err(ConfigError::Invalid(
            "store.owner must be non-empty and must not contain '/'",
        ));
    }

    if cfg.ai.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("ai.base_url must be non-empty"));
    }
    if cfg.ai.model.trim().is_empty() {
        return Err(ConfigError::Invalid("ai.model must be non-empty"));
    }
    if cfg.ai.timeout_seconds == 0 {
        return Err(ConfigError::Invalid("ai.timeout_seconds must be > 0"));
    }
    // api_key may be empty here; SHELF_AI_API_KEY can supply it at runtime.

    Ok(())
}

/// Returns the example YAML content shipped with the binary.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  catalog_path: "./data/journals.csv"
  page_size: 20
  locale: "en"

store:
  database_url: "sqlite://./data/shelf.db"
  owner: "local"

ai:
  base_url: "https://generativelanguage.googleapis.com/"
  api_key: "YOUR_API_KEY"
  model: "gemini-2.5-flash"
  timeout_seconds: 60
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.page_size, 20);
        assert_eq!(cfg.store.owner, "local");
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let yaml = r#"app:
  data_dir: "./data"
  catalog_path: "./data/journals.csv"
store:
  database_url: "sqlite::memory:"
  owner: "me"
ai:
  base_url: "http://localhost/"
  api_key: ""
  model: "m"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.page_size, 20);
        assert_eq!(cfg.app.locale, "en");
        assert_eq!(cfg.ai.timeout_seconds, 60);
    }

    #[test]
    fn invalid_owner() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.store.owner = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("store.owner")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.store.owner = "a/b".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_numbers() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.page_size = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("page_size")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.ai.timeout_seconds = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_required_strings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.catalog_path = " ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.store.database_url = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.ai.model = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.ai.model, "gemini-2.5-flash");
    }
}
