//! ML model inference components

pub mod inference;
pub mod loader;

pub use inference::{FraudScorer, InferenceEngine};
pub use loader::ModelLoader;
