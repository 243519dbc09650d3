//! Shared server state

use crate::error::{Result, ServiceError};
use crate::feature_aligner::FeatureAligner;
use crate::metrics::ServiceMetrics;
use crate::models::FraudScorer;
use crate::types::{PredictionResponse, RawTable};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Read-only resources shared across requests
#[derive(Clone)]
pub struct AppState {
    pub aligner: Arc<FeatureAligner>,
    pub scorer: Arc<dyn FraudScorer>,
    pub metrics: Arc<ServiceMetrics>,
    /// Rows scoring strictly above this are flagged
    pub threshold: f64,
}

impl AppState {
    pub fn new(
        aligner: Arc<FeatureAligner>,
        scorer: Arc<dyn FraudScorer>,
        metrics: Arc<ServiceMetrics>,
        threshold: f64,
    ) -> Self {
        Self {
            aligner,
            scorer,
            metrics,
            threshold,
        }
    }

    /// Align, score and summarise one table. Blocking; call off the async runtime.
    ///
    /// Fails as a whole: no partial predictions are ever returned.
    pub fn score_table(&self, table: &RawTable, request_id: &str) -> Result<PredictionResponse> {
        let start = Instant::now();

        let matrix = self.aligner.align(table)?;
        let scores = self
            .scorer
            .score(&matrix)
            .map_err(|e| ServiceError::Inference(format!("{:#}", e)))?;

        if scores.len() != matrix.rows() {
            return Err(ServiceError::Inference(format!(
                "model '{}' returned {} scores for {} rows",
                self.scorer.name(),
                scores.len(),
                matrix.rows()
            )));
        }

        let response = PredictionResponse::from_scores(scores, self.threshold);
        let elapsed = start.elapsed();
        self.metrics.record_batch(elapsed, &response);

        info!(
            request_id = %request_id,
            rows = response.summary.total_transactions,
            high_risk = response.summary.high_risk,
            low_risk = response.summary.low_risk,
            processing_time_us = elapsed.as_micros(),
            "Batch scored"
        );

        Ok(response)
    }
}
