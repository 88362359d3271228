//! Review workflow
//!
//! Per filename: Submitted -> InReview (draft uploaded) -> Approved (draft
//! moved over the original) -> Converted (PDF exists) -> Finalized (PDF
//! emailed). "Approved" is never stored; it is the absence of a draft, so a
//! draft uploaded after approval reopens review.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use shared_types::{DocumentCategory, DocumentSummary};

use crate::converter::{pdf_name, ConvertError, Converter};
use crate::notifier::{Notifier, NotifyError, OutgoingEmail};
use crate::reviewers::{ReviewerDirectory, ReviewerError};
use crate::store::{validate_filename, DocumentLocks, DocumentStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("PDF conversion failed")]
    ConversionFailed(#[source] ConvertError),
    #[error("Failed to send final policy")]
    DeliveryFailed(#[source] NotifyError),
    #[error("Failed to save reviewer assignments")]
    Reviewers(#[from] ReviewerError),
    #[error("Document storage failed")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidFilename(_) => WorkflowError::BadRequest("Invalid filename".to_string()),
            StoreError::NotFound { category, .. } => WorkflowError::NotFound(
                match category {
                    DocumentCategory::Original => "Original file not found",
                    DocumentCategory::Draft => "Draft not found",
                    DocumentCategory::Pdf => "PDF not found",
                }
                .to_string(),
            ),
            other => WorkflowError::Storage(other),
        }
    }
}

/// A file part received from a client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content: Bytes,
}

/// Outcome of a submit-for-review call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub stored: Vec<String>,
    /// Files whose review request email could not be delivered
    pub notify_failures: Vec<String>,
}

/// Lock key for a PDF. The `/` keeps it apart from every valid document name.
fn pdf_lock_key(pdf: &str) -> String {
    format!("pdfs/{pdf}")
}

pub struct ReviewWorkflow {
    store: DocumentStore,
    reviewers: Arc<dyn ReviewerDirectory>,
    notifier: Arc<dyn Notifier>,
    converter: Arc<dyn Converter>,
    locks: DocumentLocks,
}

impl ReviewWorkflow {
    pub fn new(
        store: DocumentStore,
        reviewers: Arc<dyn ReviewerDirectory>,
        notifier: Arc<dyn Notifier>,
        converter: Arc<dyn Converter>,
    ) -> Self {
        Self {
            store,
            reviewers,
            notifier,
            converter,
            locks: DocumentLocks::new(),
        }
    }

    /// Store each file as an original, assign `email` as its reviewer and
    /// mail it out. Mail failures are logged and skipped; the assignment map
    /// is persisted once at the end. The address is stored exactly as given.
    #[tracing::instrument(skip(self, files), fields(file_count = files.len()))]
    pub async fn submit_for_review(
        &self,
        files: Vec<UploadedFile>,
        email: Option<&str>,
    ) -> Result<SubmitReport, WorkflowError> {
        let email = match email {
            Some(email) if !email.is_empty() && !files.is_empty() => email,
            _ => return Err(WorkflowError::BadRequest("Missing files or email".to_string())),
        };
        for file in &files {
            validate_filename(&file.filename)?;
        }

        let mut report = SubmitReport::default();
        for file in files {
            {
                let _guard = self.locks.lock(&file.filename).await;
                self.store
                    .save(DocumentCategory::Original, &file.filename, &file.content)
                    .await?;
                self.reviewers.set(&file.filename, email).await;
            }
            report.stored.push(file.filename.clone());

            let message = OutgoingEmail::review_request(email, &file.filename, file.content);
            if let Err(e) = self.notifier.send(message).await {
                tracing::error!(filename = %file.filename, error = %e, "Failed to send review email");
                report.notify_failures.push(file.filename);
            }
        }

        self.reviewers.persist().await?;
        tracing::info!(
            stored = report.stored.len(),
            notify_failures = report.notify_failures.len(),
            "Files sent for review"
        );
        Ok(report)
    }

    /// Store a reviewer's draft, replacing any previous draft of that name.
    #[tracing::instrument(skip(self, file), fields(filename = %file.filename))]
    pub async fn upload_draft(&self, file: UploadedFile) -> Result<(), WorkflowError> {
        validate_filename(&file.filename)?;
        let _guard = self.locks.lock(&file.filename).await;
        self.store
            .save(DocumentCategory::Draft, &file.filename, &file.content)
            .await?;
        tracing::info!("Draft uploaded");
        Ok(())
    }

    /// Every original with its derived draft/approval flags.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>, WorkflowError> {
        let originals = self.store.list(DocumentCategory::Original).await?;
        let drafts = self.store.names(DocumentCategory::Draft).await?;
        Ok(originals
            .into_iter()
            .map(|filename| {
                let has_draft = drafts.contains(&filename);
                DocumentSummary::new(filename, has_draft)
            })
            .collect())
    }

    /// Replace the original with its draft.
    #[tracing::instrument(skip(self))]
    pub async fn approve_draft(&self, filename: &str) -> Result<(), WorkflowError> {
        validate_filename(filename)?;
        let _guard = self.locks.lock(filename).await;
        self.store.promote_draft(filename).await?;
        tracing::info!("Draft approved, original replaced");
        Ok(())
    }

    /// Path of a stored document, for streaming back to the client.
    pub async fn locate(
        &self,
        category: DocumentCategory,
        filename: &str,
    ) -> Result<PathBuf, WorkflowError> {
        Ok(self.store.locate(category, filename).await?)
    }

    /// Convert the original to PDF, returning the PDF's filename.
    #[tracing::instrument(skip(self))]
    pub async fn convert_to_pdf(&self, filename: &str) -> Result<String, WorkflowError> {
        validate_filename(filename)?;
        let pdf = pdf_name(filename);
        // `x.docx` and `x.doc` both write `x.pdf`, so the output gets its own
        // lock. Always taken after the original's.
        let _guard = self.locks.lock(filename).await;
        let _pdf_guard = self.locks.lock(&pdf_lock_key(&pdf)).await;
        let source = self.store.locate(DocumentCategory::Original, filename).await?;
        let out_dir = self.store.dir(DocumentCategory::Pdf);

        let produced = self
            .converter
            .convert(&source, &out_dir)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "PDF conversion failed");
                WorkflowError::ConversionFailed(e)
            })?;

        tracing::info!(path = %produced.display(), pdf = %pdf, "Converted PDF saved");
        Ok(pdf)
    }

    /// Email the converted PDF of `filename` to its assigned reviewer.
    #[tracing::instrument(skip(self))]
    pub async fn send_final_policy(&self, filename: &str) -> Result<(), WorkflowError> {
        validate_filename(filename)?;
        let pdf = pdf_name(filename);
        let content = {
            let _pdf_guard = self.locks.lock(&pdf_lock_key(&pdf)).await;
            self.store.read(DocumentCategory::Pdf, &pdf).await?
        };

        let Some(recipient) = self.reviewers.get(filename).await else {
            return Err(WorkflowError::NotFound("Reviewer email not found".to_string()));
        };

        self.notifier
            .send(OutgoingEmail::final_policy(&recipient, &pdf, content))
            .await
            .map_err(|e| {
                tracing::error!(recipient = %recipient, error = %e, "Failed to send final policy");
                WorkflowError::DeliveryFailed(e)
            })?;

        tracing::info!(recipient = %recipient, pdf = %pdf, "Final policy sent");
        Ok(())
    }
}
