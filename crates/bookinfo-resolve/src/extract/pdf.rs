use std::path::Path;
use std::process::Command;
use std::time::Duration;

use lopdf::Document;
use tracing::debug;

use super::FileMetadata;
use super::tools::{run_with_timeout, scratch_path, take_scratch};
use crate::error::{ResolveError, Result};

/// `Title` and `Author` from the document Info dictionary.
pub fn read_metadata(pdf_path: &Path) -> Result<FileMetadata> {
    let metadata = Document::load_metadata(pdf_path).map_err(|err| {
        ResolveError::PdfExtraction(format!(
            "lopdf failed to read metadata from {}: {err}",
            pdf_path.display()
        ))
    })?;

    Ok(FileMetadata {
        title: metadata.title.as_deref().and_then(clean_metadata_field),
        author: metadata.author.as_deref().and_then(clean_metadata_field),
        isbn: None,
    })
}

/// Text of the first `max_pages` pages. Falls back to `pdftotext` when
/// `lopdf` yields nothing usable.
pub fn extract_text(pdf_path: &Path, max_pages: usize, timeout: Duration) -> Result<String> {
    if max_pages == 0 {
        return Ok(String::new());
    }

    let lopdf_error = match extract_text_with_lopdf(pdf_path, max_pages) {
        Ok(text) if !text.trim().is_empty() => return Ok(text),
        Ok(_) => "lopdf extracted no text".to_string(),
        Err(err) => err.to_string(),
    };
    debug!("{lopdf_error}; trying pdftotext for {}", pdf_path.display());

    match extract_text_with_pdftotext(pdf_path, max_pages, timeout) {
        Ok(text) => Ok(text),
        Err(err) => Err(ResolveError::PdfExtraction(format!("{lopdf_error}; {err}"))),
    }
}

fn extract_text_with_lopdf(pdf_path: &Path, max_pages: usize) -> Result<String> {
    let document = Document::load(pdf_path).map_err(|err| {
        ResolveError::PdfExtraction(format!(
            "lopdf failed to open {}: {err}",
            pdf_path.display()
        ))
    })?;

    let mut text = String::new();
    for page_number in document.get_pages().keys().copied().take(max_pages) {
        match document.extract_text(&[page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(err) => debug!(
                "skipping page {page_number} of {}: {err}",
                pdf_path.display()
            ),
        }
    }
    Ok(text)
}

fn extract_text_with_pdftotext(
    pdf_path: &Path,
    max_pages: usize,
    timeout: Duration,
) -> Result<String> {
    let output_path = scratch_path("pdftotext", "txt");
    let mut command = Command::new("pdftotext");
    command
        .arg("-f")
        .arg("1")
        .arg("-l")
        .arg(max_pages.to_string())
        .arg(pdf_path)
        .arg(&output_path);

    if let Err(err) = run_with_timeout(command, "pdftotext", timeout) {
        let _ = std::fs::remove_file(&output_path);
        return Err(err);
    }
    let bytes = take_scratch(&output_path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// First page rendered to PNG, `pdftoppm` first and `mutool draw` second.
pub fn render_first_page(pdf_path: &Path, dpi: u32, timeout: Duration) -> Result<Option<Vec<u8>>> {
    let pdftoppm_error = match render_with_pdftoppm(pdf_path, dpi, timeout) {
        Ok(bytes) if !bytes.is_empty() => return Ok(Some(bytes)),
        Ok(_) => "pdftoppm produced an empty image".to_string(),
        Err(err) => err.to_string(),
    };
    debug!("{pdftoppm_error}; trying mutool for {}", pdf_path.display());

    match render_with_mutool(pdf_path, dpi, timeout) {
        Ok(bytes) if !bytes.is_empty() => Ok(Some(bytes)),
        Ok(_) => Ok(None),
        Err(err) => Err(ResolveError::PdfExtraction(format!("{pdftoppm_error}; {err}"))),
    }
}

fn render_with_pdftoppm(pdf_path: &Path, dpi: u32, timeout: Duration) -> Result<Vec<u8>> {
    // pdftoppm takes an output prefix and appends `.png` itself.
    let output_path = scratch_path("pdftoppm", "png");
    let prefix = output_path.with_extension("");
    let mut command = Command::new("pdftoppm");
    command
        .args(["-f", "1", "-l", "1", "-png", "-singlefile", "-r"])
        .arg(dpi.to_string())
        .arg(pdf_path)
        .arg(&prefix);

    if let Err(err) = run_with_timeout(command, "pdftoppm", timeout) {
        let _ = std::fs::remove_file(&output_path);
        return Err(err);
    }
    take_scratch(&output_path)
}

fn render_with_mutool(pdf_path: &Path, dpi: u32, timeout: Duration) -> Result<Vec<u8>> {
    let output_path = scratch_path("mutool", "png");
    let mut command = Command::new("mutool");
    command
        .arg("draw")
        .arg("-q")
        .arg("-r")
        .arg(dpi.to_string())
        .arg("-o")
        .arg(&output_path)
        .arg(pdf_path)
        .arg("1");

    if let Err(err) = run_with_timeout(command, "mutool", timeout) {
        let _ = std::fs::remove_file(&output_path);
        return Err(err);
    }
    take_scratch(&output_path)
}

fn clean_metadata_field(raw: &str) -> Option<String> {
    let normalized = raw
        .replace('\0', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

#[cfg(test)]
mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};
    use tempfile::TempDir;

    use super::*;

    fn write_sample_pdf(path: &Path, title: &str, author: &str) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal("Hello Bookshelf")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Author" => Object::string_literal(author),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn reads_info_dictionary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.pdf");
        write_sample_pdf(&path, "  The   Pragmatic Programmer ", "Andrew Hunt");

        let meta = read_metadata(&path).unwrap();
        assert_eq!(meta.title.as_deref(), Some("The Pragmatic Programmer"));
        assert_eq!(meta.author.as_deref(), Some("Andrew Hunt"));
        assert_eq!(meta.isbn, None);
    }

    #[test]
    fn extracts_page_text_with_lopdf() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.pdf");
        write_sample_pdf(&path, "Title", "Author");

        let text = extract_text(&path, 5, Duration::from_secs(5)).unwrap();
        assert!(text.contains("Hello Bookshelf"), "got {text:?}");
    }

    #[test]
    fn zero_pages_is_empty() {
        let text = extract_text(Path::new("/nonexistent.pdf"), 0, Duration::from_secs(1)).unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn garbage_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        assert!(read_metadata(&path).is_err());
    }

    #[test]
    fn metadata_fields_are_cleaned() {
        assert_eq!(
            clean_metadata_field("A\0Title\n  Here").as_deref(),
            Some("A Title Here")
        );
        assert_eq!(clean_metadata_field(" \0 "), None);
    }
}
