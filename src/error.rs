use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinError;

use crate::plant_model::ModelError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    NotMultipart(#[from] MultipartRejection),
    #[error("Missing form field \"file\"")]
    MissingFile,
    #[error("Uploaded file is empty")]
    EmptyFile,
    #[error("{0}")]
    Model(#[from] ModelError),
    #[error("Inference task failed: {0}")]
    Join(#[from] JoinError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Multipart(e) => e.status(),
            AppError::NotMultipart(e) => e.status(),
            AppError::MissingFile | AppError::EmptyFile => StatusCode::BAD_REQUEST,
            AppError::Model(ModelError::UnsupportedFormat) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Model(ModelError::ImageProcessing(_)) => StatusCode::BAD_REQUEST,
            AppError::Model(_) | AppError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the uploader.
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "The model could not process this image. Please try again later.".to_string()
        } else {
            self.to_string()
        }
    }

    pub fn log(&self) {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, %status, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status();
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
