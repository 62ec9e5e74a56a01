use std::{env, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub github: GitHubConfig,
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DbConfig {
    /// Job status/result store.
    pub url: String,
    /// Queue backing store for the job workers.
    pub jobs_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// Default token used when a request or webhook carries none.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Shared secret for webhook signature verification. When unset,
    /// inbound webhooks are accepted unverified.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

fn default_api_base() -> String { "https://api.github.com".to_string() }

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_openai_api_base() -> String { "https://api.openai.com/v1".to_string() }

fn default_model() -> String { "gpt-4o-mini".to_string() }

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// In-flight job limit for the analysis worker.
    #[serde(default = "default_analyze_pr_concurrency")]
    pub analyze_pr_concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self { Self { analyze_pr_concurrency: default_analyze_pr_concurrency() } }
}

fn default_analyze_pr_concurrency() -> usize { 4 }

impl Config {
    /// Load configuration from a YAML file, then apply environment
    /// overrides for secrets.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = BufReader::new(
            File::open(path.as_ref())
                .with_context(|| format!("Failed to open {}", path.as_ref().display()))?,
        );
        let mut config: Self =
            serde_yaml::from_reader(file).context("Failed to parse config file")?;
        if let Ok(token) = env::var("GITHUB_TOKEN") {
            config.github.token = token;
        }
        if let Ok(secret) = env::var("WEBHOOK_SECRET") {
            config.github.webhook_secret = Some(secret);
        }
        if let Ok(api_key) = env::var("OPENAI_API_KEY") {
            config.openai.api_key = api_key;
        }
        Ok(config)
    }
}
