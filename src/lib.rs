//! Fraud Scoring Service Library
//!
//! Serves a trained fraud classifier over HTTP. Uploaded transaction tables are
//! aligned to the exact feature layout used at training time before scoring.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod feature_aligner;
pub mod metrics;
pub mod models;
pub mod sentinel;
pub mod server;
pub mod types;

pub use artifacts::{ArtifactFitter, ArtifactStore, Artifacts};
pub use config::AppConfig;
pub use error::ServiceError;
pub use feature_aligner::{AlignedMatrix, FeatureAligner};
pub use models::{FraudScorer, InferenceEngine};
pub use types::{PredictionResponse, RawTable};
