use anyhow::{Context, Result};
use apalis::prelude::*;
use pullcheck_ai::Analyzer;
use pullcheck_core::models::{FileAnalysis, FileChange, Issue, JobResult};
use pullcheck_github::collect_pr_files;
use serde::{Deserialize, Serialize};

use crate::JobContext;

/// Job to analyze one pull request end-to-end.
///
/// The token travels only in the queue payload; it is never written
/// to the job status store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzePrJob {
    /// Id of the job record created at enqueue time.
    pub job_id: String,
    pub repo_url: String,
    pub pr_number: u64,
    pub token: String,
}

/// Process a PR analysis job.
///
/// This handles:
/// - Claiming the job record (PENDING -> RUNNING)
/// - Collecting the PR's changed code files with their patches
/// - Running the analysis capability per file
/// - Storing the aggregated result, or the fatal collection error
///
/// Per-file analysis failures never fail the job; they surface as
/// `error`-kind issues in the result. A fatal collection error (diff
/// or file listing fetch) marks the job FAILURE.
pub async fn process_analyze_pr_job(job: AnalyzePrJob, ctx: Data<JobContext>) -> Result<()> {
    tracing::info!(
        "Processing analysis job {}: {} PR #{}",
        job.job_id,
        job.repo_url,
        job.pr_number
    );

    let claimed = ctx.db.mark_running(&job.job_id).await.context("Failed to mark job running")?;
    if !claimed {
        // Redelivered job that already reached a terminal state.
        tracing::warn!("Job {} is already finished, skipping", job.job_id);
        return Ok(());
    }

    match collect_pr_files(ctx.github.as_ref(), &job.repo_url, job.pr_number, &job.token).await {
        Ok(files) => {
            tracing::info!("Collected {} analyzable files for job {}", files.len(), job.job_id);
            let analysis = aggregate(&files, ctx.analyzer.as_ref()).await;
            let result = JobResult {
                repo_url: job.repo_url.clone(),
                pr_number: job.pr_number,
                analysis,
            };
            ctx.db
                .mark_success(&job.job_id, &result)
                .await
                .context("Failed to store job result")?;
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to collect PR files for job {}: {e}", job.job_id);
            ctx.db
                .mark_failure(&job.job_id, &format!("Error analyzing PR: {e}"))
                .await
                .context("Failed to store job failure")?;
            Err(e.into())
        }
    }
}

/// Run the analysis capability over each collected file, in input
/// order. One file's failure is recorded as a single synthetic
/// `error` issue and never aborts the remaining files.
pub async fn aggregate<A: Analyzer + ?Sized>(
    files: &[FileChange],
    analyzer: &A,
) -> Vec<FileAnalysis> {
    let mut results = Vec::with_capacity(files.len());
    for file in files {
        let issues = match analyzer
            .analyze(&file.filename, &file.content, file.patch.as_deref())
            .await
        {
            Ok(issues) => issues,
            Err(e) => {
                tracing::error!("AI analysis failed for {}: {e}", file.filename);
                vec![Issue::analysis_failure(&e)]
            }
        };
        results.push(FileAnalysis { filename: file.filename.clone(), issues });
    }
    results
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pullcheck_ai::{AnalysisError, Analyzer};
    use pullcheck_core::models::{FileChange, Issue};

    use super::aggregate;

    /// Analyzer that fails for a fixed set of filenames.
    struct StubAnalyzer {
        broken: Vec<String>,
    }

    #[async_trait]
    impl Analyzer for StubAnalyzer {
        async fn analyze(
            &self,
            filename: &str,
            _content: &str,
            patch: Option<&str>,
        ) -> Result<Vec<Issue>, AnalysisError> {
            if self.broken.iter().any(|name| name == filename) {
                return Err(AnalysisError::EmptyResponse);
            }
            Ok(vec![Issue {
                kind: "style".to_string(),
                line: Some(1),
                description: format!("issue in {filename}"),
                suggestion: patch.map(|_| "apply the patch".to_string()),
            }])
        }
    }

    fn file(name: &str) -> FileChange {
        FileChange {
            filename: name.to_string(),
            content: "content".to_string(),
            patch: Some(format!("diff --git a/{name} b/{name}")),
        }
    }

    #[tokio::test]
    async fn test_failing_file_is_isolated() {
        let files = [file("one.py"), file("two.py"), file("three.py")];
        let analyzer = StubAnalyzer { broken: vec!["two.py".to_string()] };

        let results = aggregate(&files, &analyzer).await;

        let names: Vec<_> = results.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, ["one.py", "two.py", "three.py"]);
        assert_eq!(results[0].issues[0].kind, "style");
        assert_eq!(results[2].issues[0].kind, "style");
        assert_eq!(results[1].issues.len(), 1);
        assert_eq!(results[1].issues[0].kind, "error");
        assert!(results[1].issues[0].description.starts_with("AI analysis failed:"));
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_result() {
        let analyzer = StubAnalyzer { broken: Vec::new() };
        assert!(aggregate(&[], &analyzer).await.is_empty());
    }
}
