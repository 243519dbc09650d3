//! Configuration management for the fraud scoring service

use crate::sentinel::{IDENTIFIER_COLUMN, LABEL_COLUMN};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configuration file location
pub const CONFIG_PATH_ENV: &str = "FRAUD_SCORING_CONFIG";

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Allowed CORS origins ("*" = any)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl ServerConfig {
    /// Resolve the socket address to bind
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

/// Trained artifact locations
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory containing the artifacts and the model
    pub dir: String,
    #[serde(default = "default_encoders_file")]
    pub encoders_file: String,
    #[serde(default = "default_scaler_file")]
    pub scaler_file: String,
    #[serde(default = "default_features_file")]
    pub features_file: String,
    /// Exported classifier (ONNX)
    #[serde(default = "default_model_file")]
    pub model_file: String,
}

fn default_encoders_file() -> String {
    "encoders.json".to_string()
}

fn default_scaler_file() -> String {
    "scaler.json".to_string()
}

fn default_features_file() -> String {
    "features.json".to_string()
}

fn default_model_file() -> String {
    "fraud_model.onnx".to_string()
}

impl ArtifactsConfig {
    pub fn model_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.model_file)
    }
}

/// Column roles in uploaded and training tables
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    /// Row identifier column, never a feature
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Training label column, only read by the artifact fitter
    #[serde(default = "default_label_column")]
    pub label_column: String,
}

fn default_id_column() -> String {
    IDENTIFIER_COLUMN.to_string()
}

fn default_label_column() -> String {
    LABEL_COLUMN.to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            id_column: default_id_column(),
            label_column: default_label_column(),
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// A row is flagged when its score is strictly above this value
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

/// ONNX Runtime settings
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    /// Number of intra-op threads for the model session
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            onnx_threads: default_onnx_threads(),
        }
    }
}

/// Metrics reporting
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between logged summaries (0 disables the reporter)
    pub report_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `FRAUD_SCORING_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    ///
    /// Values can be overridden with `FRAUD__<SECTION>__<KEY>` environment variables.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("FRAUD").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.detection.threshold) {
            anyhow::bail!(
                "detection.threshold must be within [0, 1], got {}",
                self.detection.threshold
            );
        }
        if self.inference.onnx_threads == 0 {
            anyhow::bail!("inference.onnx_threads must be at least 1");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                max_upload_bytes: default_max_upload_bytes(),
                cors_origins: default_cors_origins(),
            },
            artifacts: ArtifactsConfig {
                dir: "models".to_string(),
                encoders_file: default_encoders_file(),
                scaler_file: default_scaler_file(),
                features_file: default_features_file(),
                model_file: default_model_file(),
            },
            features: FeaturesConfig::default(),
            detection: DetectionConfig::default(),
            inference: InferenceConfig::default(),
            metrics: MetricsConfig {
                report_interval_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
