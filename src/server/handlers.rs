//! HTTP request handlers
//!
//! Axum handlers for the prediction API.

use crate::error::ServiceError;
use crate::metrics::MetricsSnapshot;
use crate::server::{state::AppState, ApiError};
use crate::types::{PredictionResponse, RawTable};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info, warn};

/// Multipart field carrying the uploaded table
pub const UPLOAD_FIELD: &str = "file";

/// Liveness text
pub const LIVENESS_TEXT: &str = "Fraud Prediction API is running.";

/// Generate a request ID
fn request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Liveness check
pub async fn home() -> &'static str {
    LIVENESS_TEXT
}

/// Score an uploaded CSV table
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictionResponse>, ApiError> {
    let req_id = request_id();

    let rejected = |e: MultipartError| {
        state.metrics.record_failure();
        warn!(request_id = %req_id, status = %e.status(), error = %e, "Rejected upload");
        ApiError::new(e.status(), e.body_text(), &req_id)
    };

    let mut upload: Option<Bytes> = None;
    while let Some(field) = multipart.next_field().await.map_err(rejected)? {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field.bytes().await.map_err(rejected)?;
            upload = Some(bytes);
            break;
        }
    }

    let Some(bytes) = upload else {
        state.metrics.record_failure();
        warn!(request_id = %req_id, "Upload has no file field");
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("multipart field '{}' is required", UPLOAD_FIELD),
            &req_id,
        ));
    };

    score_payload(state, req_id, move || RawTable::from_csv_bytes(&bytes)).await
}

/// Score one transaction object or an array of them
pub async fn predict_transaction(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, ApiError> {
    let req_id = request_id();

    score_payload(state, req_id, move || {
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| ServiceError::InputShape(format!("body is not valid JSON: {}", e)))?;
        RawTable::from_json(&value)
    })
    .await
}

/// Current service metrics
pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Parse, align and score on the blocking pool
async fn score_payload<F>(
    state: AppState,
    req_id: String,
    parse: F,
) -> Result<Json<PredictionResponse>, ApiError>
where
    F: FnOnce() -> Result<RawTable, ServiceError> + Send + 'static,
{
    let worker_state = state.clone();
    let worker_id = req_id.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let table = parse()?;
        info!(
            request_id = %worker_id,
            rows = table.row_count(),
            columns = table.columns().len(),
            column_names = ?table.columns(),
            "Received input table"
        );
        worker_state.score_table(&table, &worker_id)
    })
    .await;

    match outcome {
        Ok(Ok(response)) => Ok(Json(response)),
        Ok(Err(e)) => {
            state.metrics.record_failure();
            if e.is_input_shape() {
                warn!(request_id = %req_id, error = %e, "Rejected input table");
            } else {
                error!(request_id = %req_id, error = %e, "Scoring failed");
            }
            Err(ApiError::from_service(&e, &req_id))
        }
        Err(e) => {
            state.metrics.record_failure();
            error!(request_id = %req_id, error = %e, "Scoring task panicked");
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "scoring task failed",
                &req_id,
            ))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::testing::{stub_state, StubScorer};

    #[tokio::test]
    async fn test_home() {
        assert_eq!(home().await, LIVENESS_TEXT);
    }

    #[tokio::test]
    async fn test_predict_transaction_single_object() {
        let state = stub_state(StubScorer::Constant(0.9));
        let body = Bytes::from_static(br#"{"TransactionID": 1, "amount": 50.0, "country": "US"}"#);

        let Json(response) = predict_transaction(State(state.clone()), body).await.unwrap();
        assert_eq!(response.predictions, vec![0.9]);
        assert_eq!(response.fraud_flags, vec![1]);
        assert_eq!(response.summary.total_transactions, 1);
        assert_eq!(state.metrics.snapshot().requests_served, 1);
    }

    #[tokio::test]
    async fn test_predict_transaction_rejects_bad_json() {
        let state = stub_state(StubScorer::Constant(0.1));
        let err = predict_transaction(State(state.clone()), Bytes::from_static(b"not json"))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(state.metrics.snapshot().requests_failed, 1);
    }

    #[tokio::test]
    async fn test_inference_failure_is_server_error() {
        let state = stub_state(StubScorer::Failing);
        let body = Bytes::from_static(br#"[{"amount": 1}]"#);

        let err = predict_transaction(State(state), body).await.unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_metrics_snapshot() {
        let state = stub_state(StubScorer::Constant(0.2));
        let body = Bytes::from_static(br#"[{"amount": 1}, {"amount": 2}]"#);
        predict_transaction(State(state.clone()), body).await.unwrap();

        let Json(snapshot) = metrics_snapshot(State(state)).await;
        assert_eq!(snapshot.rows_scored, 2);
        assert_eq!(snapshot.high_risk_rows, 0);
    }
}
