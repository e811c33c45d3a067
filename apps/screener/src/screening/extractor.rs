//! Text extraction from uploaded documents.
//!
//! Extraction never fails: a document that cannot be parsed yields an empty
//! string and the caller decides what "too little text" means.

use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

/// Parser selected from the declared file name's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentKind {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" | "doc" => Some(DocumentKind::Docx),
            "txt" | "odt" => Some(DocumentKind::PlainText),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Plain text of `bytes`, or an empty string when the format is unknown
    /// or the document cannot be parsed.
    pub fn extract(&self, bytes: &[u8], file_name: &str) -> String {
        let Some(kind) = DocumentKind::from_file_name(file_name) else {
            warn!("Unsupported file extension: {file_name}");
            return String::new();
        };

        let text = match kind {
            DocumentKind::Pdf => extract_pdf(bytes),
            DocumentKind::Docx => extract_docx(bytes),
            DocumentKind::PlainText => Some(String::from_utf8_lossy(bytes).into_owned()),
        };

        match text {
            Some(text) => {
                debug!("Extracted {} chars from {file_name}", text.chars().count());
                text
            }
            None => {
                warn!("Could not extract text from {file_name} ({kind:?})");
                String::new()
            }
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Option<String> {
    // pdf-extract panics on some malformed inputs.
    match panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    })) {
        Ok(Ok(text)) => Some(text),
        Ok(Err(e)) => {
            debug!("PDF parse error: {e}");
            None
        }
        Err(_) => {
            warn!("PDF parser panicked");
            None
        }
    }
}

fn extract_docx(bytes: &[u8]) -> Option<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).ok()?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .ok()?
        .read_to_string(&mut xml)
        .ok()?;
    document_xml_text(&xml)
}

/// Concatenates `w:t` runs; each `w:p` ends a line, `w:tab` is a tab and
/// `w:br` a line break.
fn document_xml_text(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" => out.push('\n'),
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_run => out.push_str(&e.unescape().ok()?),
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!("DOCX XML error at {}: {e}", reader.buffer_position());
                return None;
            }
            _ => {}
        }
    }

    Some(out.trim_end().to_string())
}
