use std::io::Read;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{info, warn};

use crate::error::TextExtractError;
use crate::Document;

/// A resume file that could not be loaded. Carried into the final result so
/// no candidate silently vanishes.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Raw-text extraction for one file, dispatched on extension. PDF and DOCX
/// bodies are decoded; `.txt`/`.text` are read as-is.
pub fn extract_text(path: &Path) -> Result<String, TextExtractError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => extract_pdf(path),
        "docx" => extract_docx(path),
        "txt" | "text" => {
            std::fs::read_to_string(path).map_err(|err| TextExtractError::CorruptFile {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })
        }
        _ => Err(TextExtractError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        }),
    }
}

fn extract_pdf(path: &Path) -> Result<String, TextExtractError> {
    pdf_extract::extract_text(path).map_err(|err| TextExtractError::CorruptFile {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// DOCX is a zip; the body text lives in `word/document.xml`. Paragraph ends
/// become newlines so downstream prompts keep some structure.
fn extract_docx(path: &Path) -> Result<String, TextExtractError> {
    let corrupt = |reason: String| TextExtractError::CorruptFile {
        path: path.to_path_buf(),
        reason,
    };

    let file = std::fs::File::open(path).map_err(|err| corrupt(err.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|err| corrupt(err.to_string()))?;
    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|err| corrupt(err.to_string()))?
        .read_to_string(&mut document_xml)
        .map_err(|err| corrupt(err.to_string()))?;

    let mut reader = Reader::from_str(&document_xml);
    let mut text = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Text(chunk)) => {
                let chunk = chunk.unescape().map_err(|err| corrupt(err.to_string()))?;
                text.push_str(&chunk);
            }
            Ok(Event::End(element)) if element.name().as_ref() == b"w:p" => text.push('\n'),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(corrupt(err.to_string())),
        }
    }
    Ok(text)
}

/// Load every supported resume under `dir`, sorted by file name so insertion
/// order (and therefore tie-breaking) is identical across runs. Unreadable or
/// unsupported files are skipped with a warning.
pub fn load_documents(dir: &Path) -> std::io::Result<(Vec<Document>, Vec<SkippedFile>)> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    info!(dir = %dir.display(), files = paths.len(), "loading resumes");

    let mut documents = Vec::new();
    let mut skipped = Vec::new();
    for path in paths {
        match extract_text(&path) {
            Ok(text) => {
                let id = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("unknown")
                    .to_string();
                documents.push(Document::new(id, text));
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping resume file");
                skipped.push(SkippedFile {
                    path,
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok((documents, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txt_files_are_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.txt");
        std::fs::write(&path, "5 years Python").unwrap();

        assert_eq!(extract_text(&path).unwrap(), "5 years Python");
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.odt");
        std::fs::write(&path, "whatever").unwrap();

        assert!(matches!(
            extract_text(&path),
            Err(TextExtractError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn corrupt_docx_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.txt"), "2 years Java").unwrap();
        std::fs::write(dir.path().join("broken.docx"), b"not a zip at all").unwrap();

        let (documents, skipped) = load_documents(dir.path()).unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "good");
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].path.ends_with("broken.docx"));
    }

    #[test]
    fn documents_load_in_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("c.txt"), "c").unwrap();

        let (documents, _) = load_documents(dir.path()).unwrap();
        let ids: Vec<_> = documents.iter().map(|d| d.id.as_str()).collect();

        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
