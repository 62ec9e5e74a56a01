mod handlers;

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use axum::{Router, extract::FromRef, http::header};
use pullcheck_ai::{Analyzer, OpenAiAnalyzer};
use pullcheck_core::config::Config;
use pullcheck_db::Database;
use pullcheck_github::GitHubClient;
use pullcheck_jobs::{JobContext, JobStorage, create_monitor};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    ServiceBuilderExt,
    normalize_path::NormalizePathLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::handlers::build_router;

#[derive(Clone, FromRef)]
pub struct AppState {
    config: Arc<Config>,
    db: Arc<Database>,
    jobs: Arc<JobStorage>,
}

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let config = Arc::new(Config::load("config.yml").expect("Failed to load config file"));
    let db = Arc::new(Database::new(&config.db).await.expect("Failed to open database"));
    let github = Arc::new(
        GitHubClient::new(config.github.api_base.as_str())
            .expect("Failed to create GitHub client"),
    );
    let analyzer: Arc<dyn Analyzer> =
        Arc::new(OpenAiAnalyzer::new(&config.openai).expect("Failed to create OpenAI client"));
    let jobs = JobStorage::setup(&config.db).await.expect("Failed to set up job storage");

    let job_context = JobContext { db: db.clone(), github, analyzer };
    let state = AppState { config: config.clone(), db: db.clone(), jobs: jobs.clone() };

    // Create the job monitor
    let monitor = create_monitor(jobs, job_context, &config.worker);

    // Build the router and listener
    let router = app(state);
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server.port));
    tracing::info!("Web server: Listening on {}", addr);
    let listener = TcpListener::bind(addr).await.expect("bind error");

    // Run the web server and job monitor concurrently, with graceful shutdown
    let web_server = async {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Web server error");
        tracing::info!("Web server stopped");
        result
    };
    let job_monitor = async {
        let result =
            monitor.run_with_signal(shutdown_signal_io()).await.context("Job monitor error");
        tracing::info!("Job monitor stopped");
        result
    };

    if let Err(e) = tokio::try_join!(web_server, job_monitor) {
        tracing::error!("{e}");
    }

    db.close().await;
    tracing::info!("Shut down gracefully");
}

fn app(state: AppState) -> Router {
    let sensitive_headers: Arc<[_]> = vec![header::AUTHORIZATION].into();
    let middleware = ServiceBuilder::new()
        .sensitive_request_headers(sensitive_headers.clone())
        .sensitive_response_headers(sensitive_headers)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(120)))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .compression();
    build_router().with_state(state).layer(middleware)
}

async fn shutdown_signal() {
    shutdown_signal_io().await.expect("Failed to install shutdown signal handler")
}

/// Shutdown signal that returns io::Result for apalis compatibility.
async fn shutdown_signal_io() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await
    }
}
