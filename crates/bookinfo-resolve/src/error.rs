use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("PDF extraction error: {0}")]
    PdfExtraction(String),

    #[error("EPUB extraction error: {0}")]
    EpubExtraction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
