use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use registrar_engine::EngineError;

use crate::validate::ValidationError;

/// Everything a handler can fail with, and the status it maps to.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid JSON body: {0}")]
    Body(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("item {index}: {source}")]
    BatchItem { index: usize, source: ValidationError },

    #[error("{0}")]
    Engine(#[from] EngineError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Body(_) | GatewayError::Validation(_) | GatewayError::BatchItem { .. } => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = serde_json::json!({ "ok": false, "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
