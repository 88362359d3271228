//! Review workflow endpoints
//!
//! Handlers only decode requests and encode responses; the state transitions
//! live in [`crate::workflow`].

use std::path::PathBuf;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Request, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use shared_types::{
    ConvertResponse, DocumentCategory, DocumentSummary, FilenameRequest, MessageResponse,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::api::ApiState;
use crate::workflow::{UploadedFile, WorkflowError};

/// Parts of a multipart upload this service cares about
#[derive(Debug, Default)]
struct UploadForm {
    files: Vec<UploadedFile>,
    email: Option<String>,
}

fn malformed(e: impl std::fmt::Display) -> WorkflowError {
    WorkflowError::BadRequest(format!("Malformed multipart body: {e}"))
}

/// Collect every file part named `file_field` plus the optional `email` field.
async fn read_upload_form(
    form: Result<Multipart, MultipartRejection>,
    file_field: &str,
) -> Result<UploadForm, WorkflowError> {
    let mut form = form.map_err(malformed)?;
    let mut upload = UploadForm::default();

    while let Some(field) = form.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_owned();
        if name == file_field {
            let filename = field
                .file_name()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    WorkflowError::BadRequest("Uploaded file has no filename".to_string())
                })?
                .to_owned();
            let content = field.bytes().await.map_err(malformed)?;
            upload.files.push(UploadedFile { filename, content });
        } else if name == "email" {
            upload.email = Some(field.text().await.map_err(malformed)?);
        } else {
            tracing::debug!(field = %name, "Ignoring unexpected multipart field");
        }
    }

    Ok(upload)
}

fn filename_from(payload: Result<Json<FilenameRequest>, JsonRejection>) -> Result<String, WorkflowError> {
    match payload {
        Ok(Json(req)) => Ok(req.filename),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected filename request body");
            Err(WorkflowError::BadRequest("Missing filename".to_string()))
        }
    }
}

/// POST /send-review — multipart `files[]` + `email`
pub async fn send_review(
    State(state): State<ApiState>,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>, WorkflowError> {
    let upload = read_upload_form(form, "files").await?;
    state
        .workflow
        .submit_for_review(upload.files, upload.email.as_deref())
        .await?;
    Ok(Json(MessageResponse::new("All files sent for review!")))
}

/// POST /upload-draft — multipart `file`
pub async fn upload_draft(
    State(state): State<ApiState>,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>, WorkflowError> {
    let upload = read_upload_form(form, "file").await?;
    let Some(file) = upload.files.into_iter().next() else {
        return Err(WorkflowError::BadRequest("Missing file".to_string()));
    };
    state.workflow.upload_draft(file).await?;
    Ok(Json(MessageResponse::new("Draft uploaded successfully!")))
}

/// GET /files
pub async fn list_files(
    State(state): State<ApiState>,
) -> Result<Json<Vec<DocumentSummary>>, WorkflowError> {
    Ok(Json(state.workflow.list_documents().await?))
}

/// POST /approve — `{filename}`
pub async fn approve(
    State(state): State<ApiState>,
    payload: Result<Json<FilenameRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, WorkflowError> {
    let filename = filename_from(payload)?;
    state.workflow.approve_draft(&filename).await?;
    Ok(Json(MessageResponse::new(
        "Draft approved and original file replaced",
    )))
}

/// POST /convert-pdf — `{filename}`
pub async fn convert_pdf(
    State(state): State<ApiState>,
    payload: Result<Json<FilenameRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>, WorkflowError> {
    let filename = filename_from(payload)?;
    let pdf = state.workflow.convert_to_pdf(&filename).await?;
    Ok(Json(ConvertResponse {
        message: "Converted to PDF!".to_string(),
        pdf,
    }))
}

/// POST /send-final-policy — `{filename}` of the original
pub async fn send_final_policy(
    State(state): State<ApiState>,
    payload: Result<Json<FilenameRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, WorkflowError> {
    let filename = filename_from(payload)?;
    state.workflow.send_final_policy(&filename).await?;
    Ok(Json(MessageResponse::new("Final policy sent successfully!")))
}

/// GET /download/{original|draft}/{filename}
pub async fn download_document(
    State(state): State<ApiState>,
    Path((category, filename)): Path<(String, String)>,
    request: Request,
) -> Result<Response, WorkflowError> {
    let category = category
        .parse::<DocumentCategory>()
        .map_err(WorkflowError::BadRequest)?;
    let path = state.workflow.locate(category, &filename).await?;
    Ok(serve_file(path, &filename, request).await)
}

/// GET /download/pdf/{filename}
pub async fn download_pdf(
    State(state): State<ApiState>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, WorkflowError> {
    let path = state
        .workflow
        .locate(DocumentCategory::Pdf, &filename)
        .await?;
    Ok(serve_file(path, &filename, request).await)
}

/// `Content-Disposition` for a download of `filename`.
///
/// Plain ASCII names go in a quoted `filename`; anything else gets a
/// sanitized fallback plus an RFC 5987 `filename*`.
pub fn attachment_disposition(filename: &str) -> HeaderValue {
    let plain = filename
        .chars()
        .all(|c| matches!(c, ' '..='~') && c != '"' && c != '\\');
    let value = if plain {
        format!("attachment; filename=\"{filename}\"")
    } else {
        let fallback: String = filename
            .chars()
            .map(|c| match c {
                '"' | '\\' => '_',
                ' '..='~' => c,
                _ => '_',
            })
            .collect();
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            utf8_percent_encode(filename, NON_ALPHANUMERIC)
        )
    };
    // Every byte above is visible ASCII, so this cannot fail in practice.
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Stream a file as an attachment, content type guessed from its extension.
async fn serve_file(path: PathBuf, filename: &str, request: Request) -> Response {
    let mut response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    };
    if response.status().is_success() {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, attachment_disposition(filename));
    }
    response
}
