//! Document Extractor — turns a PDF or DOCX blob into normalized plain text.
//!
//! Never fails upward: any unreadable document yields an empty string, which
//! downstream treats as the "image PDF" case and records a placeholder row.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::models::message::ResumeFormat;

/// Extracts plain text from a résumé blob of the given format.
///
/// Guarantee: always returns a string, empty when the document has no
/// extractable text (e.g. a pure image scan).
pub fn extract_text(blob: &[u8], format: ResumeFormat) -> String {
    match format {
        ResumeFormat::Pdf => extract_pdf(blob),
        ResumeFormat::Docx => extract_docx(blob),
    }
}

/// Structural page-by-page extraction, falling back to a layout-aware pass
/// over the same bytes when the structural reader fails or comes back empty.
fn extract_pdf(blob: &[u8]) -> String {
    let text = match structural_pdf_text(blob) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            debug!("structural PDF extraction yielded no text, trying layout-aware pass");
            layout_pdf_text(blob)
        }
        Err(e) => {
            warn!("structural PDF extraction failed ({e}), trying layout-aware pass");
            layout_pdf_text(blob)
        }
    };
    normalize_extracted(&text)
}

fn structural_pdf_text(blob: &[u8]) -> Result<String, lopdf::Error> {
    let doc = lopdf::Document::load_mem(blob)?;
    let mut text = String::new();
    for page_number in doc.get_pages().keys() {
        text.push_str(&doc.extract_text(&[*page_number]).unwrap_or_default());
    }
    Ok(text)
}

fn layout_pdf_text(blob: &[u8]) -> String {
    pdf_extract::extract_text_from_mem(blob).unwrap_or_else(|e| {
        warn!("layout-aware PDF extraction failed: {e}");
        String::new()
    })
}

/// DOCX extraction order mirrors the review workflow's expectations: all
/// table rows first (cells joined by tabs, one line per row), then every
/// top-level paragraph, one per line.
fn extract_docx(blob: &[u8]) -> String {
    match docx_lines(blob) {
        Ok(lines) => normalize_extracted(&lines.join("\n")),
        Err(e) => {
            warn!("DOCX extraction failed: {e}");
            String::new()
        }
    }
}

fn docx_lines(blob: &[u8]) -> anyhow::Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(blob))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);

    let mut table_lines: Vec<String> = Vec::new();
    let mut paragraph_lines: Vec<String> = Vec::new();
    let mut row_cells: Vec<String> = Vec::new();
    let mut cell_text = String::new();
    let mut paragraph_text = String::new();

    let mut table_depth: u32 = 0;
    let mut in_text_run = false;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:tc" => cell_text.clear(),
                b"w:t" => in_text_run = true,
                _ => {}
            },
            Event::End(ref e) => match e.name().as_ref() {
                b"w:tbl" => table_depth = table_depth.saturating_sub(1),
                b"w:tc" => {
                    row_cells.push(cell_text.trim_end_matches('\n').to_string());
                    cell_text.clear();
                }
                b"w:tr" => {
                    table_lines.push(row_cells.join("\t"));
                    row_cells.clear();
                }
                b"w:p" => {
                    if table_depth == 0 {
                        paragraph_lines.push(paragraph_text.clone());
                        paragraph_text.clear();
                    } else {
                        // Paragraph break inside a table cell.
                        cell_text.push('\n');
                    }
                }
                b"w:t" => in_text_run = false,
                _ => {}
            },
            Event::Text(t) => {
                if in_text_run {
                    let fragment = t.unescape()?;
                    if table_depth == 0 {
                        paragraph_text.push_str(&fragment);
                    } else {
                        cell_text.push_str(&fragment);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    table_lines.extend(paragraph_lines);
    Ok(table_lines)
}

/// Strips null bytes and collapses non-breaking spaces, newlines, and tabs
/// to single spaces, then trims.
fn normalize_extracted(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{a0}', " ")
        .replace('\n', " ")
        .replace('\t', " ")
        .trim()
        .to_string()
}

/// Builds a minimal DOCX archive around the given `w:body` XML.
/// Shared by the extractor and orchestrator tests.
#[cfg(test)]
pub(crate) fn build_docx(body_xml: &str) -> Vec<u8> {
    use std::io::Write;
    use zip::write::FileOptions;

    let document = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body_xml}</w:body></w:document>"
    );
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer
            .start_file("word/document.xml", FileOptions::default())
            .unwrap();
        writer.write_all(document.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}
