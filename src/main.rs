//! Fraud Scoring Service - Main Entry Point
//!
//! Loads the preprocessing artifacts and the classifier once, then serves
//! prediction requests over HTTP.

use anyhow::{Context, Result};
use fraud_scoring_service::{
    artifacts::ArtifactStore,
    config::{AppConfig, LoggingConfig},
    feature_aligner::FeatureAligner,
    metrics::{MetricsReporter, ServiceMetrics},
    models::{FraudScorer, InferenceEngine},
    server::{build_router, AppState},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    init_logging(&config.logging)?;
    info!("Starting Fraud Scoring Service");
    info!(
        threshold = config.detection.threshold,
        id_column = %config.features.id_column,
        artifacts_dir = %config.artifacts.dir,
        "Configuration loaded"
    );

    // Artifacts are fatal at startup: no fallback
    let artifacts = ArtifactStore::from_config(&config.artifacts)
        .load()
        .context("Failed to load preprocessing artifacts")?;
    let aligner = Arc::new(FeatureAligner::with_id_column(
        Arc::new(artifacts),
        config.features.id_column.clone(),
    ));
    info!(
        "Feature aligner initialized ({} features)",
        aligner.feature_count()
    );

    let engine = InferenceEngine::new(&config).context("Failed to load fraud model")?;
    info!(model = %engine.name(), "Inference engine initialized");
    let scorer: Arc<dyn FraudScorer> = Arc::new(engine);

    let metrics = Arc::new(ServiceMetrics::new());
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = AppState::new(aligner, scorer, metrics.clone(), config.detection.threshold);
    let app = build_router(state, &config.server);

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("fraud_scoring_service={}", logging.level))
    })?;

    if logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
