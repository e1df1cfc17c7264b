//! Text Extractor: turns an uploaded resume file into plain text.
//!
//! PDF parsing is CPU-bound and synchronous, so the PDF extractor runs on the
//! blocking pool. Pages are concatenated in document order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("resume file not readable: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("resume file is not a readable PDF: {0}")]
    Corrupt(String),

    #[error("resume contains no extractable text")]
    Empty,

    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Converts a resume file into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// `pdf-extract` backed extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let path = path.to_path_buf();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| ExtractionError::Io {
                path: path.clone(),
                source,
            })?;

        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| ExtractionError::Task(e.to_string()))?
            .map_err(|e| ExtractionError::Corrupt(e.to_string()))?;

        if text.trim().is_empty() {
            return Err(ExtractionError::Empty);
        }

        debug!("Extracted {} chars from {}", text.len(), path.display());
        Ok(text)
    }
}

/// Returns fixed text for any existing path.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct FixedTextExtractor(pub String);

#[cfg(test)]
#[async_trait]
impl TextExtractor for FixedTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        if !path.exists() {
            return Err(ExtractionError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(self.0.clone())
    }
}
