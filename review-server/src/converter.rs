//! Document -> PDF conversion
//!
//! The production converter shells out to an office suite running headless.
//! It is handed a source file and an output directory and is expected to
//! leave `<stem>.pdf` in that directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("source has no file name: {0}")]
    InvalidSource(PathBuf),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("conversion timed out after {0:?}")]
    Timeout(Duration),
    #[error("converter exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("converter produced no output at {0}")]
    MissingOutput(PathBuf),
}

/// Name of the PDF derived from a document: last extension swapped for `.pdf`.
pub fn pdf_name(filename: &str) -> String {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => filename,
    };
    format!("{stem}.pdf")
}

#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `source` into `out_dir`, returning the path of the produced PDF.
    async fn convert(&self, source: &Path, out_dir: &Path) -> Result<PathBuf, ConvertError>;
}

/// Runs `<program> --headless --convert-to pdf --outdir <out_dir> <source>`.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    timeout: Duration,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Converter for CommandConverter {
    #[tracing::instrument(skip(self), fields(program = %self.program))]
    async fn convert(&self, source: &Path, out_dir: &Path) -> Result<PathBuf, ConvertError> {
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ConvertError::InvalidSource(source.to_path_buf()))?;
        let expected = out_dir.join(pdf_name(filename));

        let child = Command::new(&self.program)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConvertError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ConvertError::Spawn {
                program: self.program.clone(),
                source,
            })?,
            Err(_) => return Err(ConvertError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            return Err(ConvertError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            return Err(ConvertError::MissingOutput(expected));
        }

        tracing::info!(pdf = %expected.display(), "Converted document to PDF");
        Ok(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_name_swaps_last_extension() {
        assert_eq!(pdf_name("x.docx"), "x.pdf");
        assert_eq!(pdf_name("annual.report.v2.doc"), "annual.report.v2.pdf");
        assert_eq!(pdf_name("already.pdf"), "already.pdf");
    }

    #[test]
    fn test_pdf_name_without_extension_appends() {
        assert_eq!(pdf_name("README"), "README.pdf");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("x.docx");
        std::fs::write(&source, b"doc").unwrap();

        let converter = CommandConverter::new(
            "definitely-not-an-installed-converter",
            Duration::from_secs(5),
        );
        let err = converter
            .convert(&source, temp_dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_exit_without_output_is_missing_output() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("x.docx");
        std::fs::write(&source, b"doc").unwrap();

        // `true` ignores its arguments and exits 0 without writing anything.
        let converter = CommandConverter::new("true", Duration::from_secs(5));
        let err = converter
            .convert(&source, temp_dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::MissingOutput(path) if path.ends_with("x.pdf")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("x.docx");
        std::fs::write(&source, b"doc").unwrap();

        let converter = CommandConverter::new("false", Duration::from_secs(5));
        let err = converter
            .convert(&source, temp_dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Failed { .. }));
    }
}
