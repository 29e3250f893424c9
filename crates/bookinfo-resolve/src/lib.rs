//! Identify a PDF/EPUB file and fetch its bibliographic record.

pub mod error;
pub mod extract;
pub mod http;
pub mod identifiers;
pub mod resolution;
pub mod sources;

pub use error::{ResolveError, Result};
pub use extract::{DefaultFileMetadataExtractor, FileMetadata, FileMetadataExtractor};
pub use identifiers::isbn::{extract_isbns, normalize_isbn};
pub use identifiers::title::clean_title_from_filename;
pub use resolution::{
    Resolver, STAGES, Stage, cover_query, remote_cover_url, remote_cover_url_blocking,
    resolve_blocking,
};
pub use sources::BookLookup;
pub use sources::google_books::{GoogleBooksSource, Volume, normalize_volume};
