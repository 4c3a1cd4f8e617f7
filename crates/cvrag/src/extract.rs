//! Plain-text extraction for source documents.
//!
//! Job descriptions and candidate material arrive as `.txt`/`.md`, PDF or
//! DOCX files. The format is chosen by file extension. Failures are
//! returned as [`ExtractError`], never panics.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// Upper bound on the decompressed size of `word/document.xml`.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedExtension(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

/// Extract text from a file on disk.
pub fn extract_file(path: &Path) -> Result<String, ExtractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let read = |path: &Path| {
        std::fs::read(path).map_err(|source| ExtractError::Io {
            path: path.display().to_string(),
            source,
        })
    };

    match ext.as_str() {
        "txt" | "md" | "markdown" => {
            let bytes = read(path)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        "pdf" => extract_pdf(&read(path)?),
        "docx" => extract_docx(&read(path)?),
        "" => Err(ExtractError::UnsupportedExtension(
            path.display().to_string(),
        )),
        other => Err(ExtractError::UnsupportedExtension(format!(".{}", other))),
    }
}

pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    docx_paragraphs(&xml)
}

/// Collect `w:t` runs, one line per `w:p` paragraph.
fn docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_plain_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jd.md");
        std::fs::write(&path, "# Senior Engineer\n\nRust required").unwrap();
        assert_eq!(
            extract_file(&path).unwrap(),
            "# Senior Engineer\n\nRust required"
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let err = extract_file(Path::new("cv.odt")).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedExtension(ref e) if e == ".odt"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = extract_file(Path::new("/nonexistent/cv.txt")).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[test]
    fn test_invalid_pdf() {
        let err = extract_pdf(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_invalid_docx() {
        let err = extract_docx(b"not a zip").unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn test_docx_paragraphs() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t xml:space="preserve">Senior </w:t></w:r><w:r><w:t>Rust Engineer</w:t></w:r></w:p><w:p><w:r><w:t>Remote &amp; hybrid</w:t></w:r></w:p></w:body></w:document>"#;
        let text = extract_docx(&docx_bytes(xml)).unwrap();
        assert_eq!(text.trim(), "Senior Rust Engineer\nRemote & hybrid");
    }

    #[test]
    fn test_docx_without_document_xml() {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        let err = extract_docx(&bytes).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }
}
