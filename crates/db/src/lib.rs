use anyhow::{Context, Result, anyhow};
use pullcheck_core::{
    config::DbConfig,
    models::{JobRecord, JobResult, JobStatus},
};
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase, sqlite::SqliteRow};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Job status/result store. The only shared mutable state in the
/// system; owned by the orchestrator, mutated by workers through the
/// guarded update operations below.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(config: &DbConfig) -> Result<Self> {
        if !Sqlite::database_exists(&config.url).await.unwrap_or(false) {
            tracing::info!(url = %config.url, "Creating database");
            Sqlite::create_database(&config.url).await.context("Failed to create database")?;
            tracing::info!("Database created");
        }
        let pool =
            SqlitePool::connect(&config.url).await.context("Failed to connect to database")?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        MIGRATOR.run(&pool).await.context("Failed to run database migrations")?;
        Ok(Self { pool })
    }

    pub async fn close(&self) { self.pool.close().await }

    /// Insert a new job in PENDING state.
    pub async fn create_job(&self, id: &str, repo_url: &str, pr_number: u64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, status, repo_url, pr_number)
            VALUES (?, 'PENDING', ?, ?)
            "#,
        )
        .bind(id)
        .bind(repo_url)
        .bind(pr_number as i64)
        .execute(&self.pool)
        .await
        .context("Failed to insert job")?;
        Ok(())
    }

    /// Transition a job to RUNNING. Redelivered jobs that already
    /// reached a terminal state are left untouched; returns whether
    /// the claim took effect.
    pub async fn mark_running(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = 'RUNNING', updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status IN ('PENDING', 'RUNNING')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a successful result. Status and result are written in a
    /// single statement so readers never observe SUCCESS without a
    /// result. Terminal states are never overwritten.
    pub async fn mark_success(&self, id: &str, result: &JobResult) -> Result<bool> {
        let data = serde_json::to_string(result).context("Failed to serialize job result")?;
        let query = sqlx::query(
            r#"
            UPDATE jobs SET status = 'SUCCESS', result = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status IN ('PENDING', 'RUNNING')
            "#,
        )
        .bind(data)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(query.rows_affected() > 0)
    }

    /// Record a fatal failure. Terminal states are never overwritten.
    pub async fn mark_failure(&self, id: &str, error: &str) -> Result<bool> {
        let query = sqlx::query(
            r#"
            UPDATE jobs SET status = 'FAILURE', error = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status IN ('PENDING', 'RUNNING')
            "#,
        )
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(query.rows_affected() > 0)
    }

    /// Fetch a job by id. An unknown id is a valid outcome, not an
    /// error.
    pub async fn get_job(&self, id: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, status, repo_url, pr_number, result, error
            FROM jobs WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(job_from_row).transpose()
    }
}

fn job_from_row(row: SqliteRow) -> Result<JobRecord> {
    let status: String = row.try_get("status")?;
    let status = JobStatus::parse(&status)
        .ok_or_else(|| anyhow!("Unknown job status in store: {status}"))?;
    let result: Option<String> = row.try_get("result")?;
    let result = result
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .context("Failed to deserialize job result")?;
    let pr_number: i64 = row.try_get("pr_number")?;
    Ok(JobRecord {
        id: row.try_get("id")?,
        status,
        repo_url: row.try_get("repo_url")?,
        pr_number: pr_number as u64,
        result,
        error: row.try_get("error")?,
    })
}

#[cfg(test)]
mod tests {
    use pullcheck_core::models::{FileAnalysis, Issue, JobResult, JobStatus};
    use sqlx::SqlitePool;

    use super::Database;

    async fn memory_db() -> Database {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        Database::from_pool(pool).await.unwrap()
    }

    fn sample_result() -> JobResult {
        JobResult {
            repo_url: "https://github.com/foo/bar".to_string(),
            pr_number: 7,
            analysis: vec![FileAnalysis {
                filename: "src/lib.rs".to_string(),
                issues: vec![Issue::analysis_failure("timeout")],
            }],
        }
    }

    #[tokio::test]
    async fn test_unknown_job_is_none() {
        let db = memory_db().await;
        assert!(db.get_job("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let db = memory_db().await;
        db.create_job("job-1", "https://github.com/foo/bar", 7).await.unwrap();

        let job = db.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.status.is_terminal());
        assert_eq!(job.repo_url, "https://github.com/foo/bar");
        assert_eq!(job.pr_number, 7);
        assert!(job.result.is_none());
        assert!(job.error.is_none());

        assert!(db.mark_running("job-1").await.unwrap());
        assert_eq!(db.get_job("job-1").await.unwrap().unwrap().status, JobStatus::Running);

        let result = sample_result();
        assert!(db.mark_success("job-1", &result).await.unwrap());
        let job = db.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Success);
        assert!(job.status.is_terminal());
        assert_eq!(job.result, Some(result));
    }

    #[tokio::test]
    async fn test_terminal_states_are_one_way() {
        let db = memory_db().await;
        db.create_job("job-1", "https://github.com/foo/bar", 7).await.unwrap();
        assert!(db.mark_running("job-1").await.unwrap());
        assert!(db.mark_failure("job-1", "diff fetch failed").await.unwrap());

        // A redelivered job must not leave its terminal state.
        assert!(!db.mark_running("job-1").await.unwrap());
        assert!(!db.mark_success("job-1", &sample_result()).await.unwrap());
        assert!(!db.mark_failure("job-1", "again").await.unwrap());

        let job = db.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failure);
        assert!(job.status.is_terminal());
        assert_eq!(job.error.as_deref(), Some("diff fetch failed"));
        assert!(job.result.is_none());
    }
}
