//! Prediction response returned to clients

use serde::{Deserialize, Serialize};

/// Aggregate counts over one scored batch.
///
/// `high_risk + low_risk == total_transactions` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub total_transactions: usize,
    pub high_risk: usize,
    pub low_risk: usize,
}

/// Per-row fraud scores and flags, in input row order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Fraud probability per row, within [0, 1]
    pub predictions: Vec<f64>,
    /// 1 when the row's prediction is strictly above the threshold
    pub fraud_flags: Vec<u8>,
    pub summary: PredictionSummary,
}

impl PredictionResponse {
    /// Flag and summarise model scores
    pub fn from_scores(predictions: Vec<f64>, threshold: f64) -> Self {
        let fraud_flags: Vec<u8> = predictions
            .iter()
            .map(|&score| u8::from(score > threshold))
            .collect();

        let total_transactions = predictions.len();
        let high_risk = fraud_flags.iter().filter(|&&flag| flag == 1).count();

        Self {
            predictions,
            fraud_flags,
            summary: PredictionSummary {
                total_transactions,
                high_risk,
                low_risk: total_transactions - high_risk,
            },
        }
    }
}
