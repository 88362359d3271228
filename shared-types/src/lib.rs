//! Shared types between the review server and its clients
//!
//! Everything here crosses the HTTP boundary as JSON. Field names follow the
//! browser client's expectations (`hasDraft`, not `has_draft`).

use serde::{Deserialize, Serialize};

// ============================================================================
// Documents
// ============================================================================

/// Which store directory a document lives in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentCategory {
    /// The authoritative current version
    Original,
    /// A reviewer-submitted replacement candidate
    Draft,
    /// Converted output
    Pdf,
}

impl DocumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Original => "original",
            DocumentCategory::Draft => "draft",
            DocumentCategory::Pdf => "pdf",
        }
    }

    /// Directory name under the upload root
    pub fn dir_name(&self) -> &'static str {
        match self {
            DocumentCategory::Original => "originals",
            DocumentCategory::Draft => "drafts",
            DocumentCategory::Pdf => "pdfs",
        }
    }
}

impl std::fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(DocumentCategory::Original),
            "draft" => Ok(DocumentCategory::Draft),
            "pdf" => Ok(DocumentCategory::Pdf),
            other => Err(format!("Unknown document category: {other}")),
        }
    }
}

/// One row of the document listing
///
/// `approved` is derived: a document counts as approved exactly when no draft
/// is pending for it. Uploading a new draft after approval flips it back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub filename: String,
    pub has_draft: bool,
    pub approved: bool,
}

impl DocumentSummary {
    pub fn new(filename: impl Into<String>, has_draft: bool) -> Self {
        Self {
            filename: filename.into(),
            has_draft,
            approved: !has_draft,
        }
    }
}

// ============================================================================
// Requests / Responses
// ============================================================================

/// Body of every endpoint that acts on a single document by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilenameRequest {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConvertResponse {
    pub message: String,
    /// Name of the produced file in the PDF store
    pub pdf: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_uses_camel_case_fields() {
        let json = serde_json::to_value(DocumentSummary::new("policy.docx", true)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "filename": "policy.docx",
                "hasDraft": true,
                "approved": false
            })
        );
    }

    #[test]
    fn test_approved_is_negation_of_draft() {
        assert!(DocumentSummary::new("a.docx", false).approved);
        assert!(!DocumentSummary::new("a.docx", true).approved);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("original".parse(), Ok(DocumentCategory::Original));
        assert_eq!("draft".parse(), Ok(DocumentCategory::Draft));
        assert_eq!("pdf".parse(), Ok(DocumentCategory::Pdf));
        assert!("drafts".parse::<DocumentCategory>().is_err());
        assert_eq!(DocumentCategory::Draft.dir_name(), "drafts");
    }
}
