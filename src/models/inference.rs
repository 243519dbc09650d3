//! Batch inference for the fraud classifier

use crate::config::AppConfig;
use crate::feature_aligner::AlignedMatrix;
use crate::models::loader::{LoadedModel, ModelLoader};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Scores an aligned matrix, one fraud probability per row.
///
/// Implementations are shared across concurrent requests.
pub trait FraudScorer: Send + Sync {
    /// Name for logs and metrics
    fn name(&self) -> &str;

    /// Probabilities in [0, 1], same length and order as the matrix rows
    fn score(&self, matrix: &AlignedMatrix) -> Result<Vec<f64>>;
}

/// Binary classifier running on ONNX Runtime
pub struct InferenceEngine {
    /// Session run needs exclusive access
    model: Mutex<LoadedModel>,
    name: String,
}

impl InferenceEngine {
    /// Load the model named in the configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::from_path(config.artifacts.model_path(), config.inference.onnx_threads)
    }

    pub fn from_path<P: AsRef<Path>>(path: P, onnx_threads: usize) -> Result<Self> {
        let loader = ModelLoader::with_threads(onnx_threads)?;
        let model = loader.load_model(path)?;
        let name = model.name.clone();

        Ok(Self {
            model: Mutex::new(model),
            name,
        })
    }

    fn run(&self, matrix: &AlignedMatrix) -> Result<Vec<f64>> {
        use ort::value::Tensor;

        let shape = vec![matrix.rows() as i64, matrix.cols() as i64];
        let input_tensor = Tensor::from_array((shape, matrix.to_f32_vec()))
            .context("Failed to create input tensor")?;

        let mut guard = self
            .model
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let model = &mut *guard;

        let outputs = model
            .session
            .run(ort::inputs![model.input_name.as_str() => input_tensor])?;

        if let Some(output) = outputs.get(model.output_name.as_str()) {
            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                let dims: Vec<i64> = shape.iter().copied().collect();
                return probabilities_from_tensor(&dims, data, matrix.rows());
            }
        }

        // Fallback: first float tensor that is not a label output
        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                let dims: Vec<i64> = shape.iter().copied().collect();
                debug!(model = %self.name, output = %name, "Extracted probabilities (fallback)");
                return probabilities_from_tensor(&dims, data, matrix.rows());
            }
        }

        anyhow::bail!("model '{}' produced no float tensor output", self.name)
    }
}

impl FraudScorer for InferenceEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, matrix: &AlignedMatrix) -> Result<Vec<f64>> {
        if matrix.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.run(matrix)?;
        debug!(model = %self.name, rows = scores.len(), "Batch inference complete");
        Ok(scores)
    }
}

/// Pull one fraud probability per row out of a model output tensor.
///
/// `[rows, k >= 2]` takes class 1; `[rows, 1]` and `[rows]` take the value.
pub fn probabilities_from_tensor(dims: &[i64], data: &[f32], rows: usize) -> Result<Vec<f64>> {
    let per_row = match dims {
        [n, k] if *n as usize == rows && *k >= 1 => *k as usize,
        [n] if *n as usize == rows => 1,
        _ => anyhow::bail!("unexpected output shape {:?} for {} rows", dims, rows),
    };

    if data.len() != rows * per_row {
        anyhow::bail!(
            "output has {} values, expected {} for shape {:?}",
            data.len(),
            rows * per_row,
            dims
        );
    }

    let class = if per_row >= 2 { 1 } else { 0 };
    data.chunks(per_row)
        .enumerate()
        .map(|(row, chunk)| {
            let p = chunk[class] as f64;
            if p.is_finite() {
                Ok(p.clamp(0.0, 1.0))
            } else {
                anyhow::bail!("non-finite probability at row {}", row)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_probability_column() {
        let probs = probabilities_from_tensor(&[3, 1], &[0.1, 0.9, 0.5], 3).unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs[1] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_two_class_output_takes_fraud_class() {
        let probs = probabilities_from_tensor(&[2, 2], &[0.8, 0.2, 0.3, 0.7], 2).unwrap();
        assert!((probs[0] - 0.2).abs() < 1e-6);
        assert!((probs[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_flat_output() {
        let probs = probabilities_from_tensor(&[2], &[0.25, 0.75], 2).unwrap();
        assert_eq!(probs, vec![0.25, 0.75]);
    }

    #[test]
    fn test_row_count_mismatch_is_error() {
        assert!(probabilities_from_tensor(&[2, 1], &[0.1, 0.2], 3).is_err());
        assert!(probabilities_from_tensor(&[2, 1], &[0.1], 2).is_err());
    }

    #[test]
    fn test_non_finite_probability_is_error() {
        assert!(probabilities_from_tensor(&[1, 1], &[f32::NAN], 1).is_err());
    }

    #[test]
    fn test_probabilities_are_clamped() {
        let probs = probabilities_from_tensor(&[2, 1], &[1.0000001, -0.0000001], 2).unwrap();
        assert_eq!(probs, vec![1.0, 0.0]);
    }
}
