//! Recipe file extraction.
//!
//! Bakers upload spreadsheets, Word files, PDFs and phone photos. Text
//! formats are flattened to plain text; images become base64 data URLs the
//! vision model can read directly.

use crate::analysis::RecipeInput;
use base64::{engine::general_purpose, Engine as _};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;

/// Supported document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Text,
    Docx,
    Xlsx,
    Pdf,
    Image,
}

impl DocumentType {
    /// Detect document type from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "md" | "text" | "csv" => Some(Self::Text),
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "pdf" => Some(Self::Pdf),
            "png" | "jpg" | "jpeg" | "gif" | "webp" => Some(Self::Image),
            _ => None,
        }
    }

    /// Detect document type from MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "text/plain" | "text/markdown" | "text/csv" => Some(Self::Text),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some(Self::Xlsx),
            "application/pdf" => Some(Self::Pdf),
            m if m.starts_with("image/") => Some(Self::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }
}

/// Result of document extraction.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub input: RecipeInput,
    pub doc_type: DocumentType,
    pub word_count: usize,
}

/// Extract recipe content from an uploaded file.
///
/// `filename` is only used to guess the image MIME type.
pub fn extract(data: &[u8], doc_type: DocumentType, filename: &str) -> Result<ExtractedDocument, String> {
    let input = match doc_type {
        DocumentType::Text => RecipeInput::Text(extract_text_file(data)?),
        DocumentType::Docx => RecipeInput::Text(extract_docx(data)?),
        DocumentType::Xlsx => RecipeInput::Text(extract_xlsx(data)?),
        DocumentType::Pdf => RecipeInput::Text(extract_pdf(data)?),
        DocumentType::Image => RecipeInput::Image(image_data_url(data, filename)),
    };

    let word_count = match &input {
        RecipeInput::Text(text) => text.split_whitespace().count(),
        RecipeInput::Image(_) => 0,
    };

    Ok(ExtractedDocument {
        input,
        doc_type,
        word_count,
    })
}

/// Encode image bytes as a `data:` URL.
pub fn image_data_url(data: &[u8], filename: &str) -> String {
    let mime = mime_guess::from_path(filename)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "image/jpeg".to_string());

    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(data))
}

fn extract_text_file(data: &[u8]) -> Result<String, String> {
    String::from_utf8(data.to_vec()).map_err(|e| format!("Invalid UTF-8: {}", e))
}

fn extract_pdf(data: &[u8]) -> Result<String, String> {
    pdf_extract::extract_text_from_mem(data).map_err(|e| format!("PDF extraction failed: {}", e))
}

fn read_zip_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| format!("missing {}", name))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read {}: {}", name, e))?;
    Ok(content)
}

fn local_name_is(start: &BytesStart<'_>, name: &[u8]) -> bool {
    start.name().local_name().as_ref() == name
}

// ============================================================================
// DOCX
// ============================================================================

fn extract_docx(data: &[u8]) -> Result<String, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(data)).map_err(|e| format!("Invalid DOCX (not a ZIP): {}", e))?;
    let document_xml = read_zip_entry(&mut archive, "word/document.xml")
        .map_err(|e| format!("Invalid DOCX: {}", e))?;

    extract_text_from_docx_xml(&document_xml)
}

fn extract_text_from_docx_xml(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut text_parts = Vec::new();
    let mut in_text_element = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if local_name_is(&e, b"t") => in_text_element = true,
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if local_name_is(&e, b"p") && !text_parts.is_empty() {
                    text_parts.push("\n".to_string());
                } else if local_name_is(&e, b"tab") {
                    text_parts.push("\t".to_string());
                }
            }
            Ok(Event::Text(e)) if in_text_element => {
                let text = e.unescape().map_err(|e| format!("XML decode error: {}", e))?;
                text_parts.push(text.to_string());
            }
            Ok(Event::End(e)) => {
                if e.name().local_name().as_ref() == b"t" {
                    in_text_element = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(text_parts.join("").trim().to_string())
}

// ============================================================================
// XLSX
// ============================================================================

/// First worksheet rendered as CSV, one line per row.
fn extract_xlsx(data: &[u8]) -> Result<String, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(data)).map_err(|e| format!("Invalid XLSX (not a ZIP): {}", e))?;

    // Workbooks with only numbers have no shared string table.
    let shared = match read_zip_entry(&mut archive, "xl/sharedStrings.xml") {
        Ok(xml) => parse_shared_strings(&xml)?,
        Err(_) => Vec::new(),
    };

    let sheet_path = first_sheet_path(&archive).ok_or("Invalid XLSX: no worksheet found")?;
    let sheet_xml = read_zip_entry(&mut archive, &sheet_path)?;
    let rows = parse_sheet_rows(&sheet_xml, &shared)?;

    Ok(rows_to_csv(&rows))
}

fn first_sheet_path<R: Read + Seek>(archive: &ZipArchive<R>) -> Option<String> {
    archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("xl/worksheets/sheet")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, name.to_string()))
        })
        .min_by_key(|(number, _)| *number)
        .map(|(_, name)| name)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Phonetic runs repeat the reading, not the content.
    let mut in_phonetic = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if local_name_is(&e, b"si") {
                    current.clear();
                } else if local_name_is(&e, b"rPh") {
                    in_phonetic = true;
                } else if local_name_is(&e, b"t") {
                    in_text = !in_phonetic;
                }
            }
            Ok(Event::Empty(e)) if local_name_is(&e, b"si") => strings.push(String::new()),
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|e| format!("XML decode error: {}", e))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Last column Excel allows (`XFD`), zero-based.
const MAX_COLUMN_INDEX: usize = 16_383;
/// Upper bound on cells materialized for one sheet, padding included.
const MAX_SHEET_CELLS: usize = 1_000_000;

/// Zero-based column index from a cell reference such as `"AB12"`.
///
/// `Ok(None)` when the reference carries no column letters.
fn column_index(reference: &str) -> Result<Option<usize>, String> {
    let invalid = || format!("Invalid cell reference: {}", reference);

    let mut one_based = 0usize;
    let mut seen_letter = false;
    for c in reference.chars().take_while(|c| c.is_ascii_alphabetic()) {
        seen_letter = true;
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        one_based = one_based
            .checked_mul(26)
            .and_then(|acc| acc.checked_add(digit))
            .filter(|&n| n <= MAX_COLUMN_INDEX + 1)
            .ok_or_else(invalid)?;
    }

    Ok(seen_letter.then(|| one_based - 1))
}

fn parse_sheet_rows(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, String> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_col = 0usize;
    let mut cell_type = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut total_cells = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if local_name_is(&e, b"row") {
                    row.clear();
                } else if local_name_is(&e, b"c") {
                    cell_col = row.len();
                    cell_type.clear();
                    value.clear();
                    for attr in e.attributes().flatten() {
                        let attr_value = attr
                            .unescape_value()
                            .map_err(|e| format!("XML decode error: {}", e))?;
                        match attr.key.local_name().as_ref() {
                            b"r" => {
                                if let Some(col) = column_index(&attr_value)? {
                                    cell_col = col;
                                }
                            }
                            b"t" => cell_type = attr_value.to_string(),
                            _ => {}
                        }
                    }
                } else if local_name_is(&e, b"v") || local_name_is(&e, b"t") {
                    in_value = true;
                }
            }
            Ok(Event::Empty(e)) if local_name_is(&e, b"row") => rows.push(Vec::new()),
            Ok(Event::Text(e)) if in_value => {
                let text = e.unescape().map_err(|e| format!("XML decode error: {}", e))?;
                value.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let resolved = if cell_type == "s" {
                        value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i))
                            .cloned()
                            .ok_or_else(|| format!("Invalid shared string index: {}", value))?
                    } else {
                        std::mem::take(&mut value)
                    };
                    if row.len() <= cell_col {
                        total_cells += cell_col + 1 - row.len();
                        if total_cells > MAX_SHEET_CELLS {
                            return Err(format!(
                                "Sheet too large: more than {} cells",
                                MAX_SHEET_CELLS
                            ));
                        }
                        row.resize(cell_col + 1, String::new());
                    }
                    row[cell_col] = resolved;
                }
                b"row" => rows.push(std::mem::take(&mut row)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn rows_to_csv(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| row.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(","))
        .collect::<Vec<_>>()
        .join("\n")
}
