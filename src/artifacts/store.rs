//! Durable storage for fitted artifacts

use crate::artifacts::{Artifacts, EncoderSet, FeatureOrder, Scaler};
use crate::config::ArtifactsConfig;
use crate::error::{Result, ServiceError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reads and writes the encoder set, scaler and feature order as JSON files
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    encoders_path: PathBuf,
    scaler_path: PathBuf,
    features_path: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `dir` with the default file names
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            encoders_path: dir.join("encoders.json"),
            scaler_path: dir.join("scaler.json"),
            features_path: dir.join("features.json"),
        }
    }

    pub fn from_config(config: &ArtifactsConfig) -> Self {
        let dir = Path::new(&config.dir);
        Self {
            encoders_path: dir.join(&config.encoders_file),
            scaler_path: dir.join(&config.scaler_file),
            features_path: dir.join(&config.features_file),
        }
    }

    /// Load all three artifacts and check their mutual consistency.
    ///
    /// Any failure is a configuration error; nothing is substituted.
    pub fn load(&self) -> Result<Artifacts> {
        let encoders: EncoderSet = read_artifact("encoders", &self.encoders_path)?;
        let scaler: Scaler = read_artifact("scaler", &self.scaler_path)?;
        let feature_order: FeatureOrder = read_artifact("feature order", &self.features_path)?;

        let artifacts = Artifacts::new(encoders, scaler, feature_order);
        artifacts.validate()?;

        info!(
            features = artifacts.feature_order.len(),
            encoders = artifacts.encoders.len(),
            "Artifacts loaded"
        );

        Ok(artifacts)
    }

    /// Write all three artifacts, creating the directory if needed
    pub fn save(&self, artifacts: &Artifacts) -> Result<()> {
        write_artifact(&self.encoders_path, &artifacts.encoders)?;
        write_artifact(&self.scaler_path, &artifacts.scaler)?;
        write_artifact(&self.features_path, &artifacts.feature_order)?;

        info!(
            encoders = %self.encoders_path.display(),
            scaler = %self.scaler_path.display(),
            features = %self.features_path.display(),
            "Artifacts saved"
        );
        Ok(())
    }
}

fn read_artifact<T: DeserializeOwned>(name: &'static str, path: &Path) -> Result<T> {
    let missing = |reason: String| ServiceError::MissingArtifact {
        name,
        path: path.to_path_buf(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| missing(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| missing(format!("cannot deserialize: {}", e)))
}

fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| ServiceError::InconsistentArtifacts(format!("cannot serialize: {}", e)))?;
    std::fs::write(path, json)?;
    Ok(())
}
