use std::path::Path;
use std::sync::Arc;

use bookinfo_core::{AppConfig, BookInfo, ExtractionConfig, FileFormat, Source};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::extract::{
    DefaultFileMetadataExtractor, FileMetadata, FileMetadataExtractor, read_file_metadata,
    read_pdf_text,
};
use crate::identifiers::isbn::{extract_isbns, preferred_isbn};
use crate::identifiers::title::clean_title_from_filename;
use crate::sources::BookLookup;
use crate::sources::google_books::{GoogleBooksSource, normalize_volume};

/// Identifier stages keep at most this many records.
const MAX_IDENTIFIER_RESULTS: usize = 10;
/// PDF text lines considered as a title candidate.
const MAX_CANDIDATE_LINES: usize = 20;
const MIN_CANDIDATE_LEN: usize = 5;

/// One step of the fallback chain, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    IsbnInFilename,
    IsbnInFileMetadata,
    FileMetadataSearch,
    FilenameTitleSearch,
    PdfText,
}

pub const STAGES: [Stage; 5] = [
    Stage::IsbnInFilename,
    Stage::IsbnInFileMetadata,
    Stage::FileMetadataSearch,
    Stage::FilenameTitleSearch,
    Stage::PdfText,
];

impl Stage {
    /// Provenance tag for records this stage produces.
    pub fn source(self) -> Source {
        match self {
            Self::IsbnInFilename => Source::IsbnFilename,
            Self::IsbnInFileMetadata | Self::FileMetadataSearch => Source::FileMetadata,
            Self::FilenameTitleSearch => Source::FilenameTitle,
            Self::PdfText => Source::PdfText,
        }
    }
}

/// Per-call state. Container metadata is read at most once.
struct Attempt<'a> {
    path: &'a Path,
    format: FileFormat,
    api_key: &'a str,
    metadata: Option<FileMetadata>,
}

impl Attempt<'_> {
    fn metadata(&mut self, extractor: &dyn FileMetadataExtractor) -> &FileMetadata {
        let (path, format) = (self.path, self.format);
        self.metadata
            .get_or_insert_with(|| read_file_metadata(extractor, path, format))
    }

    fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// Turns a PDF/EPUB file into candidate bibliographic records.
#[derive(Clone)]
pub struct Resolver {
    lookup: Arc<dyn BookLookup>,
    extractor: Arc<dyn FileMetadataExtractor>,
    max_pages: usize,
}

impl Resolver {
    pub fn new(lookup: Arc<dyn BookLookup>) -> Self {
        Self {
            lookup,
            extractor: Arc::new(DefaultFileMetadataExtractor::default()),
            max_pages: ExtractionConfig::default().max_pages,
        }
    }

    /// Production resolver backed by Google Books.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            lookup: Arc::new(GoogleBooksSource::from_config(config)),
            extractor: Arc::new(DefaultFileMetadataExtractor::from_config(&config.extraction)),
            max_pages: config.extraction.max_pages,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn FileMetadataExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Candidate records for `path`, never empty. The first record is the
    /// best guess; every record carries the stage that produced it.
    pub async fn resolve(&self, path: &Path, api_key: &str) -> Vec<BookInfo> {
        let Some(format) = validate_file(path) else {
            warn!("Invalid file: {}", path.display());
            return vec![BookInfo::empty(Source::InvalidFile)];
        };
        if api_key.is_empty() {
            error!("No API key supplied");
            return vec![BookInfo::empty(Source::InvalidApiKey)];
        }

        let mut attempt = Attempt {
            path,
            format,
            api_key,
            metadata: None,
        };
        for stage in STAGES {
            if let Some(records) = self.run_stage(stage, &mut attempt).await {
                return records;
            }
            debug!("Stage {stage:?} found nothing for {}", path.display());
        }

        info!("No metadata found for {}", path.display());
        vec![BookInfo::empty(Source::NotFound)]
    }

    /// Best single record, as used by renaming.
    pub async fn resolve_first(&self, path: &Path, api_key: &str) -> BookInfo {
        self.resolve(path, api_key)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| BookInfo::empty(Source::NotFound))
    }

    async fn run_stage(&self, stage: Stage, attempt: &mut Attempt<'_>) -> Option<Vec<BookInfo>> {
        let source = stage.source();
        match stage {
            Stage::IsbnInFilename => {
                let file_name = attempt.file_name().to_string();
                self.identifier_search(&file_name, source, attempt.api_key)
                    .await
            }
            Stage::IsbnInFileMetadata => {
                let blob = attempt.metadata(self.extractor.as_ref()).search_blob();
                self.identifier_search(&blob, source, attempt.api_key).await
            }
            Stage::FileMetadataSearch => {
                let query = attempt.metadata(self.extractor.as_ref()).title_query()?;
                info!("Searching with file metadata title/author: {query}");
                self.first_match(&query, source, attempt.api_key).await
            }
            Stage::FilenameTitleSearch => {
                let title = clean_title_from_filename(attempt.file_name());
                if title.is_empty() {
                    return None;
                }
                info!("Searching with cleaned filename title: {title}");
                self.first_match(&title, source, attempt.api_key).await
            }
            Stage::PdfText => {
                if attempt.format != FileFormat::Pdf {
                    return None;
                }
                let text = read_pdf_text(self.extractor.as_ref(), attempt.path, self.max_pages);
                if let Some(records) = self.identifier_search(&text, source, attempt.api_key).await
                {
                    return Some(records);
                }
                let line = title_candidate_line(&text)?;
                info!("Searching with PDF text line: {line}");
                self.first_match(line, source, attempt.api_key).await
            }
        }
    }

    /// `None` when `text` holds no ISBN. Otherwise always an outcome: up to
    /// ten records, or a single empty record when the lookup found nothing.
    async fn identifier_search(
        &self,
        text: &str,
        source: Source,
        api_key: &str,
    ) -> Option<Vec<BookInfo>> {
        let (isbn10s, isbn13s) = extract_isbns(text);
        let isbn = preferred_isbn(&isbn10s, &isbn13s)?;
        info!("Found ISBN {isbn} ({source}), querying {}", self.lookup.name());

        let volumes = self
            .lookup
            .query(&format!("isbn:{isbn}"), api_key)
            .await
            .unwrap_or_default();
        if volumes.is_empty() {
            return Some(vec![BookInfo::empty(source)]);
        }
        Some(
            volumes
                .iter()
                .take(MAX_IDENTIFIER_RESULTS)
                .map(|volume| normalize_volume(volume, source))
                .collect(),
        )
    }

    /// First result of a free-text query; `None` lets the chain continue.
    async fn first_match(&self, query: &str, source: Source, api_key: &str) -> Option<Vec<BookInfo>> {
        let volumes = self.lookup.query(query, api_key).await?;
        let first = volumes.first()?;
        Some(vec![normalize_volume(first, source)])
    }
}

/// Existing regular file with a supported extension.
fn validate_file(path: &Path) -> Option<FileFormat> {
    if !path.is_file() {
        return None;
    }
    FileFormat::from_path(path)
}

/// First of the leading lines that looks like prose rather than numbers.
fn title_candidate_line(text: &str) -> Option<&str> {
    text.lines()
        .take(MAX_CANDIDATE_LINES)
        .map(str::trim)
        .find(|line| {
            line.chars().count() > MIN_CANDIDATE_LEN && !line.chars().any(|c| c.is_ascii_digit())
        })
}

/// Remote cover lookup query: `isbn:<n>` when the filename carries an ISBN,
/// otherwise the cleaned filename title.
pub fn cover_query(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let (isbn10s, isbn13s) = extract_isbns(file_name);
    if let Some(isbn) = preferred_isbn(&isbn10s, &isbn13s) {
        return Some(format!("isbn:{isbn}"));
    }
    let title = clean_title_from_filename(file_name);
    (!title.is_empty()).then_some(title)
}

/// Cover link of the best Google Books match for `path`.
pub async fn remote_cover_url(
    source: &GoogleBooksSource,
    path: &Path,
    api_key: &str,
) -> Option<String> {
    let query = cover_query(path)?;
    info!("Looking up remote cover with: {query}");
    source.cover_image_url(&query, api_key).await
}

fn current_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Resolve from synchronous code on a private current-thread runtime.
pub fn resolve_blocking(resolver: &Resolver, path: &Path, api_key: &str) -> Result<Vec<BookInfo>> {
    Ok(current_thread_runtime()?.block_on(resolver.resolve(path, api_key)))
}

pub fn remote_cover_url_blocking(
    source: &GoogleBooksSource,
    path: &Path,
    api_key: &str,
) -> Result<Option<String>> {
    Ok(current_thread_runtime()?.block_on(remote_cover_url(source, path, api_key)))
}
