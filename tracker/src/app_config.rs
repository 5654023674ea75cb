use std::{env, path::PathBuf};

use anyhow::Context;
use config::Config;
use lib_email_clients::gmail::{api_quota::GMAIL_QUOTA_PER_SECOND, GMAIL_ENDPOINT};
use serde::Deserialize;

use crate::email::rules::DEFAULT_KEYWORDS;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub lookback_months: u32,
    pub channel_capacity: usize,
    pub keywords: Vec<String>,
    pub failure_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback_months: 4,
            channel_capacity: 1,
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            failure_path: PathBuf::from("unparsed/unparsed_emails.csv"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    pub base_url: String,
    pub quota_per_sec: usize,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            base_url: GMAIL_ENDPOINT.to_string(),
            quota_per_sec: GMAIL_QUOTA_PER_SECOND,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub endpoint: String,
    pub id: String,
    pub temperature: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.mistral.ai/v1/chat/completions".to_string(),
            id: "mistral-small-latest".to_string(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    pub base_url: String,
    pub version: String,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.notion.com/v1".to_string(),
            version: "2022-06-28".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub gmail: GmailConfig,
    pub model: ModelConfig,
    pub notion: NotionConfig,
}

impl AppConfig {
    /// Layers `config.toml` (optional) under `TRACKER__*` environment overrides
    pub fn load() -> anyhow::Result<Self> {
        let path = config_dir().join("config.toml");
        Self::from_file(&path.display().to_string())
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("TRACKER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Could not build configuration")?
            .try_deserialize()
            .context("config.toml is invalid")
    }
}

fn config_dir() -> PathBuf {
    match env::var("APP_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .map(|p| p.join("config"))
            .unwrap_or_else(|| PathBuf::from("config")),
    }
}

/// Credentials that only ever come from the environment
#[derive(Clone)]
pub struct Secrets {
    pub gmail_access_token: String,
    pub llm_api_key: String,
    pub notion_token: String,
    pub notion_db_id: String,
}

impl Secrets {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            gmail_access_token: required_var("GMAIL_ACCESS_TOKEN")?,
            llm_api_key: required_var("LLM_API_KEY")?,
            notion_token: required_var("NOTION_TOKEN")?,
            notion_db_id: required_var("NOTION_DB_ID")?,
        })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("notion_db_id", &self.notion_db_id)
            .finish_non_exhaustive()
    }
}

fn required_var(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{name} is not set"))
}
