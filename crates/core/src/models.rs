use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an analysis job. PENDING and RUNNING are
/// transient; SUCCESS and FAILURE are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failure,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "RUNNING" => Some(Self::Running),
            "SUCCESS" => Some(Self::Success),
            "FAILURE" => Some(Self::Failure),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Success | Self::Failure) }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// One analysis job as stored in the job store. `result` is present
/// only on SUCCESS, `error` only on FAILURE.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub repo_url: String,
    pub pr_number: u64,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

/// One changed file in a PR, ready for analysis. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub filename: String,
    pub content: String,
    /// Unified diff text scoped to this file, when a matching block
    /// exists in the PR diff.
    pub patch: Option<String>,
}

/// A single issue reported by the analysis capability. `line` is
/// absent for file-level issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Issue {
    /// Synthetic issue recorded when analysis of a file fails.
    pub fn analysis_failure(message: impl fmt::Display) -> Self {
        Self {
            kind: "error".to_string(),
            line: None,
            description: format!("AI analysis failed: {message}"),
            suggestion: None,
        }
    }
}

/// Per-file analysis outcome. Every `FileChange` handed to the
/// aggregator yields exactly one of these, even on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub filename: String,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub repo_url: String,
    pub pr_number: u64,
    pub analysis: Vec<FileAnalysis>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_round_trip() {
        for status in
            [JobStatus::Pending, JobStatus::Running, JobStatus::Success, JobStatus::Failure]
        {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("RETRY"), None);
    }

    #[test]
    fn test_issue_serialization_omits_absent_fields() {
        let issue = Issue::analysis_failure("boom");
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["description"], "AI analysis failed: boom");
        assert!(value.get("line").is_none());
        assert!(value.get("suggestion").is_none());
    }
}
