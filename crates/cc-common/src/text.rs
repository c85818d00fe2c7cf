//! Document-to-text boundary. Real PDF/DOCX extraction lives outside the
//! core; this module owns the contract and the plain-text case.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextExtractError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to extract text from {filename}: {detail}")]
    ExtractionFailure { filename: String, detail: String },
}

/// Extensions the pipeline accepts. Legacy `.doc` is deliberately absent.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "pdf", "docx"];

pub trait TextExtractor: Send + Sync {
    /// Extracts UTF-8 text from an uploaded document.
    fn extract(&self, bytes: &[u8], filename: &str) -> Result<String, TextExtractError>;
}

/// Lower-cased extension of a supported file, or `UnsupportedFormat`.
pub fn supported_extension(filename: &str) -> Result<String, TextExtractError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(TextExtractError::UnsupportedFormat(filename.to_string()))
    }
}

/// Handles `.txt` uploads directly; binary formats need a real extractor
/// wired in by the host application.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8], filename: &str) -> Result<String, TextExtractError> {
        let ext = supported_extension(filename)?;
        match ext.as_str() {
            "txt" => String::from_utf8(bytes.to_vec()).map_err(|err| {
                TextExtractError::ExtractionFailure {
                    filename: filename.to_string(),
                    detail: err.to_string(),
                }
            }),
            _ => Err(TextExtractError::ExtractionFailure {
                filename: filename.to_string(),
                detail: format!("no {ext} extractor is wired into this build"),
            }),
        }
    }
}
