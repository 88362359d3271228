//! HTTP API routes for the review service

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use shared_types::ErrorResponse;
use std::sync::Arc;

pub mod documents;

use crate::workflow::{ReviewWorkflow, WorkflowError};

#[derive(Clone)]
pub struct ApiState {
    pub workflow: Arc<ReviewWorkflow>,
}

/// Configure all API routes
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health_check))
        // Review workflow
        .route("/send-review", post(documents::send_review))
        .route("/upload-draft", post(documents::upload_draft))
        .route("/files", get(documents::list_files))
        .route("/approve", post(documents::approve))
        .route("/convert-pdf", post(documents::convert_pdf))
        .route("/send-final-policy", post(documents::send_final_policy))
        // Downloads. The static `pdf` segment takes priority over `{category}`.
        .route("/download/pdf/{filename}", get(documents::download_pdf))
        .route(
            "/download/{category}/{filename}",
            get(documents::download_document),
        )
}

/// Health check endpoint
pub async fn health_check(State(_state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "review-server",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Error body shared by every endpoint: `{"error": "..."}`
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

impl WorkflowError {
    fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::ConversionFailed(_)
            | WorkflowError::DeliveryFailed(_)
            | WorkflowError::Reviewers(_)
            | WorkflowError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Client sees the generic message; the cause stays in the server log.
        if status.is_server_error() {
            match std::error::Error::source(&self) {
                Some(cause) => tracing::error!(error = %self, cause = %cause, "Request failed"),
                None => tracing::error!(error = %self, "Request failed"),
            }
        }
        api_error(status, self.to_string())
    }
}
