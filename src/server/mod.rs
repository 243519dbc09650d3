//! REST/HTTP API server
//!
//! Accepts transaction tables, aligns them to the trained feature layout and
//! returns per-row fraud scores.
//!
//! # Example
//!
//! ```ignore
//! use fraud_scoring_service::server::{build_router, AppState};
//!
//! let app = build_router(state, &config.server);
//! let listener = tokio::net::TcpListener::bind(addr).await?;
//! axum::serve(listener, app).await?;
//! ```

mod handlers;
mod state;

pub use handlers::*;
pub use state::*;

use crate::config::ServerConfig;
use crate::error::ServiceError;
use axum::{
    extract::DefaultBodyLimit,
    http::{header::HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// Error body returned for failed requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    /// Request ID for tracing
    pub request_id: String,
}

/// Request failure with its HTTP status
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, request_id: &str) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.into(),
                request_id: request_id.to_string(),
            },
        }
    }

    /// Input problems are the caller's fault and carry the detail; everything
    /// else is ours and only the request ID leads to the logged cause
    pub fn from_service(err: &ServiceError, request_id: &str) -> Self {
        if err.is_input_shape() {
            Self::new(StatusCode::BAD_REQUEST, err.to_string(), request_id)
        } else {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal scoring error", request_id)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Build the application router
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .route("/predict/transaction", post(predict_transaction))
        .route("/metrics", get(metrics_snapshot))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(allowed))
}
