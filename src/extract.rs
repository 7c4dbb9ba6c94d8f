//! Format-specific text extraction for binary documents (PDF, DOCX, CSV).
//!
//! The loader supplies raw bytes; this module returns normalized plain
//! UTF-8 text plus format markers (PDF page offsets, CSV headers). No
//! function here panics on malformed input: extraction failures come back
//! as [`ExtractError`] and the pipeline skips the document.

use std::io::Read;

use thiserror::Error;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{0}")]
    Pdf(String),
    #[error("{0}")]
    Docx(String),
    #[error("{0}")]
    Csv(String),
}

/// PDF extraction result: concatenated page text plus the character offset
/// at which each page starts, kept as provenance metadata.
pub struct PdfText {
    pub text: String,
    pub page_offsets: Vec<usize>,
}

/// CSV extraction result: row-wise serialized text plus the header row and
/// data row count.
pub struct CsvText {
    pub text: String,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Extract PDF text. Pages are joined with paragraph breaks; the form-feed
/// page separators emitted by the PDF text extractor become page-offset
/// markers instead of staying in the text.
pub fn extract_pdf(bytes: &[u8]) -> Result<PdfText, ExtractError> {
    let raw =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut text = String::new();
    let mut page_offsets = Vec::new();
    for (i, page) in raw.split('\u{c}').enumerate() {
        let page = page.trim();
        if page.is_empty() {
            continue;
        }
        if i > 0 && !text.is_empty() {
            text.push_str("\n\n");
        }
        page_offsets.push(text.chars().count());
        text.push_str(page);
    }
    if page_offsets.is_empty() {
        page_offsets.push(0);
    }

    Ok(PdfText { text, page_offsets })
}

/// Extract DOCX text: `word/document.xml` streamed with quick-xml, one
/// line per `w:p` paragraph.
pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(ExtractError::Docx(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }

    paragraphs_from_document_xml(&doc_xml)
}

fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut paragraph = String::new();
    let mut in_text = false;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text => {
                paragraph.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let trimmed = paragraph.trim();
                    if !trimmed.is_empty() {
                        if !out.is_empty() {
                            out.push('\n');
                        }
                        out.push_str(trimmed);
                    }
                    paragraph.clear();
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

/// Serialize CSV rows into retrievable lines. Every row keeps its column
/// headers (`header: value; …`) so a single matching row carries enough
/// context to stand alone as a retrieval unit.
pub fn extract_csv(bytes: &[u8]) -> Result<CsvText, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ExtractError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut lines = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ExtractError::Csv(e.to_string()))?;
        let fields: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let header = headers.get(i).map(String::as_str).unwrap_or("");
                if header.is_empty() {
                    value.trim().to_string()
                } else {
                    format!("{}: {}", header, value.trim())
                }
            })
            .filter(|s| !s.is_empty())
            .collect();
        if !fields.is_empty() {
            lines.push(fields.join("; "));
        }
    }

    let row_count = lines.len();
    Ok(CsvText {
        text: lines.join("\n"),
        headers,
        row_count,
    })
}
