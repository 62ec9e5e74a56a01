mod jobs;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use apalis::prelude::*;
use apalis_sql::sqlite::SqliteStorage;
pub use jobs::{AnalyzePrJob, aggregate, process_analyze_pr_job};
use pullcheck_ai::Analyzer;
use pullcheck_core::config::{DbConfig, WorkerConfig};
use pullcheck_db::Database;
use pullcheck_github::GitHubClient;
use sqlx::{Sqlite, SqlitePool, migrate::MigrateDatabase};

/// Shared context available to all job handlers.
#[derive(Clone)]
pub struct JobContext {
    pub db: Arc<Database>,
    pub github: Arc<GitHubClient>,
    pub analyzer: Arc<dyn Analyzer>,
}

/// Type alias for PR analysis job storage.
pub type AnalyzePrStorage = SqliteStorage<AnalyzePrJob>;

/// Storage handles for pushing jobs from request handlers.
#[derive(Clone)]
pub struct JobStorage {
    analyze_pr: AnalyzePrStorage,
}

impl JobStorage {
    /// Set up job storage tables and create storage instances.
    pub async fn setup(db: &DbConfig) -> Result<Arc<Self>> {
        if !Sqlite::database_exists(&db.jobs_url).await.unwrap_or(false) {
            tracing::info!(url = %db.jobs_url, "Creating jobs database");
            Sqlite::create_database(&db.jobs_url)
                .await
                .context("Failed to create jobs database")?;
            tracing::info!("Jobs database created");
        }
        let pool = SqlitePool::connect(&db.jobs_url)
            .await
            .context("Failed to connect to jobs database")?;
        SqliteStorage::setup(&pool).await.context("Failed to set up job storage tables")?;
        Ok(Arc::new(Self { analyze_pr: SqliteStorage::new(pool) }))
    }

    /// Get a clone of the analysis storage for pushing jobs.
    pub fn analyze_pr(&self) -> AnalyzePrStorage { self.analyze_pr.clone() }
}

/// Create the job monitor with all workers.
///
/// No retry layer: a job's terminal state is written exactly once by
/// its handler, and the storage backend's redelivery covers worker
/// crashes before completion.
pub fn create_monitor(
    storage: Arc<JobStorage>,
    context: JobContext,
    config: &WorkerConfig,
) -> Monitor {
    Monitor::new()
        .register(
            WorkerBuilder::new("analyze-pr-worker")
                .enable_tracing()
                .catch_panic()
                .concurrency(config.analyze_pr_concurrency)
                .data(context)
                .backend(storage.analyze_pr())
                .build_fn(process_analyze_pr_job),
        )
        .shutdown_timeout(Duration::from_secs(30))
}
