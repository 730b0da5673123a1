//! Uploaded file loading
//!
//! Turns raw file bytes into document text. Plain text and Markdown are
//! decoded as UTF-8; PDF text is extracted page by page with lopdf.

use std::path::Path;

use tracing::{debug, warn};

use crate::errors::IngestionError;

/// File formats the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Markdown,
    Pdf,
}

impl FileKind {
    /// Detect the format from a lowercase extension without the dot
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "txt" => Some(FileKind::Text),
            "md" | "markdown" => Some(FileKind::Markdown),
            "pdf" => Some(FileKind::Pdf),
            _ => None,
        }
    }
}

/// Lowercase extension of a file name, without the dot
pub fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Extract the text of an uploaded file
pub fn load_document(file_name: &str, bytes: &[u8]) -> Result<String, IngestionError> {
    let extension = file_extension(file_name).unwrap_or_default();
    let kind = FileKind::from_extension(&extension)
        .ok_or_else(|| IngestionError::UnsupportedFileType { extension: extension.clone() })?;

    let text = match kind {
        FileKind::Text | FileKind::Markdown => decode_utf8(file_name, bytes)?,
        FileKind::Pdf => extract_text_from_pdf(file_name, bytes)?,
    };

    debug!(file = file_name, ?kind, bytes = bytes.len(), chars = text.chars().count(), "File loaded");
    Ok(text)
}

fn decode_utf8(file_name: &str, bytes: &[u8]) -> Result<String, IngestionError> {
    let text = std::str::from_utf8(bytes).map_err(|e| IngestionError::UnreadableFile {
        file: file_name.to_string(),
        message: format!("not valid UTF-8 ({})", e),
    })?;
    Ok(text.trim_start_matches('\u{FEFF}').to_string())
}

fn extract_text_from_pdf(file_name: &str, bytes: &[u8]) -> Result<String, IngestionError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| IngestionError::UnreadableFile {
        file: file_name.to_string(),
        message: format!("failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page, skipping");
            }
        }
    }

    let cleaned = clean_text(&text);
    if cleaned.is_empty() {
        return Err(IngestionError::UnreadableFile {
            file: file_name.to_string(),
            message: "no text content extracted from PDF".to_string(),
        });
    }

    debug!(original_len = text.len(), cleaned_len = cleaned.len(), "Text extraction complete");
    Ok(cleaned)
}

/// Collapse runs of whitespace within lines and drop empty lines
fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .replace('\u{FEFF}', "")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}
