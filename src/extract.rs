//! Text extraction for uploaded documents.
//!
//! Extraction is pipeline-layer: the upload handler supplies bytes and a
//! content type; this module returns plain UTF-8 text. Only PDF is
//! supported — everything learners upload for comprehension sessions is a
//! PDF, and unsupported types are rejected before any storage writes.

use crate::error::{Error, Result};

/// Supported MIME type for extraction.
pub const MIME_PDF: &str = "application/pdf";

/// Extract plain text from document bytes.
///
/// # Errors
///
/// `ExtractionFailed` for unsupported content types or malformed PDFs.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        other => Err(Error::ExtractionFailed(format!(
            "unsupported content-type: {}",
            other
        ))),
    }
}

/// Extract text from PDF bytes and trim surrounding whitespace.
pub fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::ExtractionFailed(e.to_string()))?;
    Ok(text.trim().to_string())
}
