pub mod diff;
pub mod files;
pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;
use http::{StatusCode, header};
use pullcheck_core::{ValidationError, models::FileChange};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{diff::extract_patch, files::is_code_file};

pub const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";

/// Source host fetch failure. Fatal to the collection step when it
/// hits the diff or file listing; per-file content fetches tolerate it.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Repository or PR not found: {url}")]
    NotFound { url: String },
    #[error("Access forbidden: {url} (check token permissions)")]
    Forbidden { url: String },
    #[error("Rate limited by source host: {url}")]
    RateLimited { url: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unexpected status {status} from {url}: {body}")]
    UnexpectedStatus { status: StatusCode, url: String, body: String },
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// One entry in a PR file listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrFile {
    #[serde(default)]
    pub filename: String,
    /// Reference to the file content at the PR head.
    #[serde(default)]
    pub raw_url: Option<String>,
}

/// Operations the collector needs from the source host. Implemented
/// by [`GitHubClient`]; tests substitute fakes.
#[async_trait]
pub trait SourceHost: Send + Sync {
    async fn list_pr_files(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        token: &str,
    ) -> Result<Vec<PrFile>, HostError>;

    /// Fetch the unified diff for the entire PR.
    async fn fetch_diff(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        token: &str,
    ) -> Result<String, HostError>;

    async fn fetch_file_content(
        &self,
        raw_url: &str,
        token: &str,
    ) -> Result<String, HostError>;
}

/// Parse a repository URL into `(owner, repo)`. The path must carry at
/// least two non-empty segments; extra segments and a trailing `.git`
/// are ignored.
pub fn parse_repo_url(repo_url: &str) -> Result<(String, String), ValidationError> {
    let url = Url::parse(repo_url)
        .map_err(|e| ValidationError::new(format!("Invalid repository URL {repo_url}: {e}")))?;
    let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some(owner), Some(repo)) => {
            let repo = repo.strip_suffix(".git").unwrap_or(repo);
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(ValidationError::new(
            "Invalid repository URL. Expected the format 'https://github.com/owner/repo'",
        )),
    }
}

/// GitHub REST client for PR file listings, diffs, and raw content.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
}

impl GitHubClient {
    pub fn new(api_base: impl Into<String>) -> Result<Self, HostError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pullcheck/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, api_base: api_base.into() })
    }

    async fn get_checked(
        &self,
        url: &str,
        token: &str,
        accept: Option<&str>,
    ) -> Result<reqwest::Response, HostError> {
        let mut request = self.http.get(url).bearer_auth(token);
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }
        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(HostError::NotFound { url: url.to_string() }),
            StatusCode::FORBIDDEN => Err(HostError::Forbidden { url: url.to_string() }),
            StatusCode::TOO_MANY_REQUESTS => Err(HostError::RateLimited { url: url.to_string() }),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(HostError::UnexpectedStatus { status, url: url.to_string(), body })
            }
        }
    }
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn list_pr_files(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        token: &str,
    ) -> Result<Vec<PrFile>, HostError> {
        let url = format!("{}/repos/{owner}/{repo}/pulls/{pr_number}/files", self.api_base);
        let response = self.get_checked(&url, token, None).await?;
        Ok(response.json().await?)
    }

    async fn fetch_diff(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        token: &str,
    ) -> Result<String, HostError> {
        let url = format!("{}/repos/{owner}/{repo}/pulls/{pr_number}.diff", self.api_base);
        let response = self.get_checked(&url, token, Some(DIFF_MEDIA_TYPE)).await?;
        Ok(response.text().await?)
    }

    async fn fetch_file_content(
        &self,
        raw_url: &str,
        token: &str,
    ) -> Result<String, HostError> {
        let response = self.get_checked(raw_url, token, None).await?;
        Ok(response.text().await?)
    }
}

/// Collect the analyzable files of a PR: full content at the PR head
/// plus the per-file patch cut out of the PR diff.
///
/// Diff and file-listing fetches are fatal. Once per-file iteration
/// has begun, failures only omit the affected file; the call returns
/// a best-effort (possibly empty) list.
pub async fn collect_pr_files<H: SourceHost + ?Sized>(
    host: &H,
    repo_url: &str,
    pr_number: u64,
    token: &str,
) -> Result<Vec<FileChange>, CollectError> {
    if repo_url.is_empty() {
        return Err(ValidationError::new("Repository URL must be provided").into());
    }
    if pr_number == 0 {
        return Err(ValidationError::new("PR number must be positive").into());
    }
    if token.is_empty() {
        return Err(ValidationError::new("GitHub token must be provided").into());
    }
    let (owner, repo) = parse_repo_url(repo_url)?;

    let diff = host.fetch_diff(&owner, &repo, pr_number, token).await?;
    let files = host.list_pr_files(&owner, &repo, pr_number, token).await?;

    let mut changes = Vec::new();
    for file in files {
        if file.filename.is_empty() {
            tracing::warn!("Skipping a file with no filename information");
            continue;
        }
        if !is_code_file(&file.filename) {
            tracing::debug!(filename = %file.filename, "Skipping non-code file");
            continue;
        }
        let Some(raw_url) = file.raw_url else {
            tracing::warn!(filename = %file.filename, "Skipping file with no raw content URL");
            continue;
        };
        match host.fetch_file_content(&raw_url, token).await {
            Ok(content) => {
                let patch = extract_patch(&diff, &file.filename);
                if patch.is_none() {
                    tracing::debug!(filename = %file.filename, "No patch block found in PR diff");
                }
                changes.push(FileChange { filename: file.filename, content, patch });
            }
            Err(e) => {
                tracing::warn!(filename = %file.filename, "Failed to fetch file content: {e}");
            }
        }
    }
    Ok(changes)
}
