//! Translation of detector failures into HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use telemetry_lib::DetectorError;

#[derive(Debug)]
pub enum ApiError {
    Detector(DetectorError),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Detector(DetectorError::SourceUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Detector(DetectorError::InvalidRecord { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Detector(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Detector(err @ DetectorError::InvalidRecord { .. }) => err.to_string(),
            ApiError::Detector(DetectorError::SourceUnavailable(msg)) => {
                tracing::error!("Batch source error: {}", msg);
                "Telemetry data is unavailable".to_string()
            }
            ApiError::Detector(err) => {
                tracing::error!("Detector error: {}", err);
                "Classification failed".to_string()
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<DetectorError> for ApiError {
    fn from(err: DetectorError) -> Self {
        ApiError::Detector(err)
    }
}
