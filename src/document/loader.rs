use std::panic;

use uuid::Uuid;

use super::{Document, DocumentKind, Upload};
use crate::error::RagError;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Decide how to read an upload: by extension first, then by PDF magic bytes.
pub fn detect_kind(filename: &str, bytes: &[u8]) -> Result<DocumentKind, RagError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => Ok(DocumentKind::Pdf),
        "txt" | "text" => Ok(DocumentKind::Text),
        "" if bytes.starts_with(PDF_MAGIC) => Ok(DocumentKind::Pdf),
        _ => Err(RagError::UnsupportedFormat(filename.to_string())),
    }
}

/// Extract the text of an uploaded PDF or plain-text file.
///
/// Blocking: PDF extraction is CPU bound, async callers should run this on a
/// blocking thread.
pub fn load_document(upload: &Upload) -> Result<Document, RagError> {
    let kind = detect_kind(&upload.filename, &upload.bytes)?;

    let (text, pages) = match kind {
        DocumentKind::Pdf => extract_pdf(&upload.filename, &upload.bytes)?,
        DocumentKind::Text => (extract_txt(&upload.bytes), 1),
    };

    if text.trim().is_empty() {
        return Err(RagError::empty_document(
            &upload.filename,
            match kind {
                DocumentKind::Pdf => "no extractable text (scanned or image-only PDFs are not supported)",
                DocumentKind::Text => "the file contains no text",
            },
        ));
    }

    log::info!(
        "Loaded '{}' ({:?}): {} pages, {} bytes",
        upload.filename,
        kind,
        pages,
        upload.bytes.len()
    );

    Ok(Document {
        id: Uuid::new_v4(),
        filename: upload.filename.clone(),
        kind,
        text,
        pages,
    })
}

fn extract_txt(bytes: &[u8]) -> String {
    let text = String::from_utf8(bytes.to_vec())
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());
    text.trim_start_matches('\u{feff}').trim().to_string()
}

fn extract_pdf(filename: &str, bytes: &[u8]) -> Result<(String, usize), RagError> {
    // pdf-extract panics on some malformed files instead of returning an error.
    let extracted = panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| RagError::empty_document(filename, "the PDF could not be parsed"))?
        .map_err(|e| RagError::empty_document(filename, e.to_string()))?;

    // Pages are separated by form feeds.
    let pages: Vec<&str> = extracted
        .split('\x0C')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect();

    Ok((pages.join("\n\n"), pages.len().max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_kind_by_extension() {
        assert_eq!(detect_kind("report.PDF", b"").unwrap(), DocumentKind::Pdf);
        assert_eq!(detect_kind("notes.txt", b"").unwrap(), DocumentKind::Text);
        assert_eq!(detect_kind("upload", b"%PDF-1.7\n").unwrap(), DocumentKind::Pdf);
    }

    #[test]
    fn rejects_other_formats() {
        assert!(matches!(
            detect_kind("slides.docx", b"PK"),
            Err(RagError::UnsupportedFormat(name)) if name == "slides.docx"
        ));
        assert!(matches!(detect_kind("README", b"hello"), Err(RagError::UnsupportedFormat(_))));
    }

    #[test]
    fn loads_plain_text() {
        let doc = load_document(&Upload::new("a.txt", "\u{feff}  Hello, world!\nSecond line.  ")).unwrap();
        assert_eq!(doc.kind, DocumentKind::Text);
        assert_eq!(doc.text, "Hello, world!\nSecond line.");
        assert_eq!(doc.pages, 1);
        assert_eq!(doc.filename, "a.txt");
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let doc = load_document(&Upload::new("a.txt", vec![b'o', b'k', 0xff, b'!'])).unwrap();
        assert!(doc.text.starts_with("ok"));
        assert!(doc.text.ends_with('!'));
    }

    #[test]
    fn whitespace_only_text_is_empty_document() {
        let err = load_document(&Upload::new("blank.txt", " \n\t ")).unwrap_err();
        assert!(matches!(err, RagError::EmptyDocument { ref filename, .. } if filename == "blank.txt"));
    }

    #[test]
    fn garbage_pdf_is_empty_document_not_a_crash() {
        let err = load_document(&Upload::new("broken.pdf", b"%PDF-1.4 this is not a pdf".to_vec())).unwrap_err();
        assert!(matches!(err, RagError::EmptyDocument { .. }));
    }
}
