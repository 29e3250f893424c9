//! Best-effort readers for PDF and EPUB containers.
//!
//! Trait methods report failures so callers and fixtures can observe them;
//! the `read_*` helpers are what the resolver uses and never fail.

use std::path::Path;
use std::time::Duration;

use bookinfo_core::{ExtractionConfig, FileFormat};
use tracing::warn;

use crate::error::Result;

pub mod epub;
pub mod pdf;
mod tools;

/// Container-level metadata in a format-independent shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Only EPUB packages carry an identifier we accept as an ISBN.
    pub isbn: Option<String>,
}

impl FileMetadata {
    /// All known values joined by spaces, for identifier scanning.
    pub fn search_blob(&self) -> String {
        [&self.isbn, &self.title, &self.author]
            .into_iter()
            .filter_map(|value| value.as_deref())
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `title` or `title author`; `None` without a title.
    pub fn title_query(&self) -> Option<String> {
        let title = self.title.as_deref().filter(|t| !t.is_empty())?;
        match self.author.as_deref().filter(|a| !a.is_empty()) {
            Some(author) => Some(format!("{title} {author}")),
            None => Some(title.to_string()),
        }
    }
}

pub trait FileMetadataExtractor: Send + Sync {
    fn extract_pdf_metadata(&self, pdf_path: &Path) -> Result<FileMetadata>;
    fn extract_epub_metadata(&self, epub_path: &Path) -> Result<FileMetadata>;
    fn extract_pdf_text(&self, pdf_path: &Path, max_pages: usize) -> Result<String>;
}

/// Reads PDFs with `lopdf` (falling back to poppler tools) and EPUBs as ZIP/OPF.
#[derive(Debug, Clone)]
pub struct DefaultFileMetadataExtractor {
    tool_timeout: Duration,
}

impl DefaultFileMetadataExtractor {
    pub fn new(tool_timeout: Duration) -> Self {
        Self { tool_timeout }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.tool_timeout())
    }
}

impl Default for DefaultFileMetadataExtractor {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl FileMetadataExtractor for DefaultFileMetadataExtractor {
    fn extract_pdf_metadata(&self, pdf_path: &Path) -> Result<FileMetadata> {
        pdf::read_metadata(pdf_path)
    }

    fn extract_epub_metadata(&self, epub_path: &Path) -> Result<FileMetadata> {
        epub::read_metadata(epub_path)
    }

    fn extract_pdf_text(&self, pdf_path: &Path, max_pages: usize) -> Result<String> {
        pdf::extract_text(pdf_path, max_pages, self.tool_timeout)
    }
}

/// Container metadata for `path`, empty on any failure.
pub fn read_file_metadata(
    extractor: &dyn FileMetadataExtractor,
    path: &Path,
    format: FileFormat,
) -> FileMetadata {
    let result = match format {
        FileFormat::Pdf => extractor.extract_pdf_metadata(path),
        FileFormat::Epub => extractor.extract_epub_metadata(path),
    };
    result.unwrap_or_else(|err| {
        warn!("Failed to extract {format} metadata from {}: {err}", path.display());
        FileMetadata::default()
    })
}

/// Text of the first `max_pages` pages, empty on any failure.
pub fn read_pdf_text(extractor: &dyn FileMetadataExtractor, path: &Path, max_pages: usize) -> String {
    extractor
        .extract_pdf_text(path, max_pages)
        .unwrap_or_else(|err| {
            warn!("Failed to extract text from PDF {}: {err}", path.display());
            String::new()
        })
}

/// Raw cover image bytes: the first PDF page rendered to PNG, or the
/// EPUB's declared (or first) manifest image.
pub fn extract_cover_image(
    path: &Path,
    format: FileFormat,
    config: &ExtractionConfig,
) -> Option<Vec<u8>> {
    let result = match format {
        FileFormat::Pdf => pdf::render_first_page(path, config.cover_dpi, config.tool_timeout()),
        FileFormat::Epub => epub::read_cover(path),
    };
    result.unwrap_or_else(|err| {
        warn!("Failed to extract cover image from {}: {err}", path.display());
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;

    struct FailingExtractor;

    impl FileMetadataExtractor for FailingExtractor {
        fn extract_pdf_metadata(&self, _pdf_path: &Path) -> Result<FileMetadata> {
            Err(ResolveError::PdfExtraction("broken xref".to_string()))
        }

        fn extract_epub_metadata(&self, _epub_path: &Path) -> Result<FileMetadata> {
            Err(ResolveError::EpubExtraction("not a zip".to_string()))
        }

        fn extract_pdf_text(&self, _pdf_path: &Path, _max_pages: usize) -> Result<String> {
            Err(ResolveError::PdfExtraction("no pages".to_string()))
        }
    }

    #[test]
    fn failures_degrade_to_empty_values() {
        let path = Path::new("/tmp/whatever.pdf");
        assert_eq!(
            read_file_metadata(&FailingExtractor, path, FileFormat::Pdf),
            FileMetadata::default()
        );
        assert_eq!(
            read_file_metadata(&FailingExtractor, path, FileFormat::Epub),
            FileMetadata::default()
        );
        assert_eq!(read_pdf_text(&FailingExtractor, path, 5), "");
    }

    #[test]
    fn search_blob_orders_isbn_title_author() {
        let meta = FileMetadata {
            title: Some("Dune".to_string()),
            author: Some("Frank Herbert".to_string()),
            isbn: Some("9780441013593".to_string()),
        };
        assert_eq!(meta.search_blob(), "9780441013593 Dune Frank Herbert");
        assert_eq!(FileMetadata::default().search_blob(), "");
    }

    #[test]
    fn title_query_requires_title() {
        let mut meta = FileMetadata {
            title: None,
            author: Some("Frank Herbert".to_string()),
            isbn: None,
        };
        assert_eq!(meta.title_query(), None);

        meta.title = Some("Dune".to_string());
        assert_eq!(meta.title_query().as_deref(), Some("Dune Frank Herbert"));

        meta.author = None;
        assert_eq!(meta.title_query().as_deref(), Some("Dune"));
    }

    #[test]
    fn missing_files_yield_no_cover() {
        let config = ExtractionConfig::default();
        let missing = Path::new("/nonexistent/bookinfo/cover.epub");
        assert_eq!(extract_cover_image(missing, FileFormat::Epub, &config), None);
    }
}
