//! Document loading: raw file bytes → normalized [`Document`].
//!
//! The content hash is computed over the raw bytes before any parsing, so
//! identical bytes always yield the same hash even when extraction fails.
//! One file's failure is returned as a [`LoadError`] for the caller to
//! collect; it never aborts the rest of the batch.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::errors::LoadError;
use crate::extract;
use crate::models::Document;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_CSV: &str = "text/csv";
pub const MIME_TEXT: &str = "text/plain";

/// Map a file extension to a supported MIME type.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "docx" => Some(MIME_DOCX),
        "csv" => Some(MIME_CSV),
        "txt" | "md" => Some(MIME_TEXT),
        _ => None,
    }
}

/// Load one file into a normalized [`Document`].
///
/// `source_id` is the path relative to the source root, which keeps ids
/// stable when the root moves between machines.
pub fn load(path: &Path, source_id: &str) -> Result<Document, LoadError> {
    let mime = mime_for_path(path).ok_or_else(|| {
        LoadError::UnsupportedFormat(
            path.extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_else(|| "(none)".to_string()),
        )
    })?;

    let bytes = std::fs::read(path).map_err(|source| LoadError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    // Hash before parsing: identical bytes, identical hash, parse or not.
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let content_hash = format!("{:x}", hasher.finalize());

    let (raw_text, metadata_json) = extract_for_mime(&bytes, mime, path)?;

    Ok(Document {
        source_id: source_id.to_string(),
        content_hash,
        mime_type: mime.to_string(),
        raw_text,
        metadata_json,
        ingested_at: chrono::Utc::now().timestamp(),
    })
}

fn extract_for_mime(
    bytes: &[u8],
    mime: &'static str,
    path: &Path,
) -> Result<(String, String), LoadError> {
    match mime {
        MIME_PDF => {
            let pdf = extract::extract_pdf(bytes).map_err(|e| corrupt("pdf", path, e))?;
            let metadata = serde_json::json!({
                "pages": pdf.page_offsets.len(),
                "page_offsets": pdf.page_offsets,
            });
            Ok((pdf.text, metadata.to_string()))
        }
        MIME_DOCX => {
            let text = extract::extract_docx(bytes).map_err(|e| corrupt("docx", path, e))?;
            Ok((text, "{}".to_string()))
        }
        MIME_CSV => {
            let csv = extract::extract_csv(bytes).map_err(|e| corrupt("csv", path, e))?;
            let metadata = serde_json::json!({
                "headers": csv.headers,
                "rows": csv.row_count,
            });
            Ok((csv.text, metadata.to_string()))
        }
        _ => {
            let text = String::from_utf8_lossy(bytes).trim().to_string();
            Ok((text, "{}".to_string()))
        }
    }
}

fn corrupt(format: &'static str, path: &Path, err: extract::ExtractError) -> LoadError {
    LoadError::Corrupt {
        format,
        path: path.to_path_buf(),
        detail: err.to_string(),
    }
}
