use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("OCR request cancelled")]
    Cancelled,

    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl OcrError {
    pub fn status(&self) -> StatusCode {
        match self {
            OcrError::ImageDecode(_) => StatusCode::BAD_REQUEST,
            OcrError::Validation(_) => StatusCode::BAD_REQUEST,
            OcrError::Json(_) => StatusCode::BAD_REQUEST,
            OcrError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            OcrError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            OcrError::Storage(_)
            | OcrError::Config(_)
            | OcrError::Io(_)
            | OcrError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, OcrError>;
