use std::time::Duration;

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;
use pullcheck_core::{config::OpenAiConfig, models::Issue};
use serde::Deserialize;
use thiserror::Error;

/// Per-file analysis failure. Converted to an `error`-kind issue by
/// the aggregator, never propagated past it.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("OpenAI API call failed: {0}")]
    Api(#[from] OpenAIError),
    #[error("Model returned an empty response")]
    EmptyResponse,
    #[error("Failed to decode JSON from model response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// The analysis capability: inspect one file's content and patch and
/// return structured issues.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        filename: &str,
        content: &str,
        patch: Option<&str>,
    ) -> Result<Vec<Issue>, AnalysisError>;
}

/// OpenAI-backed analyzer: single-turn chat completion with a
/// JSON-only response contract.
pub struct OpenAiAnalyzer {
    client: Client<OpenAIConfig>,
    model: String,
}

/// Completions over a full file can be slow, but a hung connection
/// must not stall the job forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

impl OpenAiAnalyzer {
    pub fn new(config: &OpenAiConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(config.api_key.as_str())
                .with_api_base(config.api_base.as_str()),
        )
        .with_http_client(http_client);
        Ok(Self { client, model: config.model.clone() })
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    async fn analyze(
        &self,
        filename: &str,
        content: &str,
        patch: Option<&str>,
    ) -> Result<Vec<Issue>, AnalysisError> {
        let prompt = analysis_prompt(filename, content, patch);
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .temperature(0.3)
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into()])
            .build()?;
        let response = self.client.chat().create(request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(AnalysisError::EmptyResponse)?;
        tracing::debug!(filename, "Received analysis response ({} bytes)", content.len());
        parse_issues(&content)
    }
}

fn analysis_prompt(filename: &str, content: &str, patch: Option<&str>) -> String {
    format!(
        r#"Analyze the following code file "{filename}" for:
- Code style issues
- Bugs
- Performance improvements
- Best practices

Provide the results in JSON format only, without any additional text or explanations. The JSON format should be:
{{
    "issues": [
        {{"type": "<type>", "line": <line>, "description": "<description>", "suggestion": "<suggestion>"}}
    ]
}}

### Full Code:
{content}

### Patch (Changes):
{patch}
"#,
        patch = patch.unwrap_or("(no patch available)"),
    )
}

#[derive(Deserialize)]
struct IssuesResponse {
    #[serde(default)]
    issues: Vec<Issue>,
}

/// Parse the model's `{"issues": [...]}` response, tolerating the
/// JSON being wrapped in a fenced code block.
pub fn parse_issues(response: &str) -> Result<Vec<Issue>, AnalysisError> {
    let json = match response.find("```json") {
        Some(start) => {
            let rest = &response[start + "```json".len()..];
            match rest.find("```") {
                Some(end) => rest[..end].trim(),
                None => rest.trim(),
            }
        }
        None => response.trim(),
    };
    let parsed: IssuesResponse = serde_json::from_str(json)?;
    Ok(parsed.issues)
}
