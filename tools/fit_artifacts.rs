//! Artifact Fitter
//!
//! Fits the label encoders, scaler and feature order from a training CSV and
//! writes them where the scoring service expects them.
//!
//! Usage: fit-artifacts <transactions.csv> [artifact_dir] [identity.csv]
//!
//! Column roles and the default artifact directory come from the same
//! configuration the server reads, so both sides strip the same identifier.

use anyhow::{Context, Result};
use fraud_scoring_service::{
    artifacts::{ArtifactFitter, ArtifactStore},
    config::AppConfig,
    types::RawTable,
};
use std::path::Path;
use tracing::info;

fn read_table(path: &str) -> Result<RawTable> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path))?;
    let table = RawTable::from_csv_bytes(&bytes).with_context(|| format!("Failed to parse {}", path))?;
    info!(
        path = %path,
        rows = table.row_count(),
        columns = table.columns().len(),
        "Loaded table"
    );
    Ok(table)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fit_artifacts=info".parse()?)
                .add_directive("fraud_scoring_service=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(transactions_path) = args.get(1) else {
        anyhow::bail!("usage: fit-artifacts <transactions.csv> [artifact_dir] [identity.csv]");
    };

    let config = AppConfig::load().context("Failed to load configuration")?;
    let id_column = config.features.id_column.as_str();
    let label_column = config.features.label_column.as_str();
    let artifact_dir = args
        .get(2)
        .map(|s| s.as_str())
        .unwrap_or(config.artifacts.dir.as_str());
    let identity_path = args.get(3);

    let mut table = read_table(transactions_path)?;
    if let Some(identity_path) = identity_path {
        let identity = read_table(identity_path)?;
        table = table
            .left_join(&identity, id_column)
            .context("Failed to merge identity table")?;
        info!(columns = table.columns().len(), "Merged identity table");
    }

    if table.column_index(label_column).is_none() {
        tracing::warn!(label = %label_column, "Training table has no label column");
    }

    let artifacts = ArtifactFitter::from_config(&config.features).fit(&table);
    ArtifactStore::new(Path::new(artifact_dir))
        .save(&artifacts)
        .with_context(|| format!("Failed to save artifacts to {}", artifact_dir))?;

    info!(
        features = artifacts.feature_order.len(),
        encoders = artifacts.encoders.len(),
        dir = %artifact_dir,
        "Artifacts written"
    );

    Ok(())
}
