use serde::{Deserialize, Serialize};

/// Which resolution stage produced a [`BookInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    InvalidFile,
    InvalidApiKey,
    IsbnFilename,
    FileMetadata,
    FilenameTitle,
    PdfText,
    NotFound,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidFile => "invalid_file",
            Self::InvalidApiKey => "invalid_api_key",
            Self::IsbnFilename => "isbn_filename",
            Self::FileMetadata => "file_metadata",
            Self::FilenameTitle => "filename_title",
            Self::PdfText => "pdf_text",
            Self::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical book record returned by the resolver.
///
/// Unknown fields stay `None` and serialize as `null`, so every record has
/// the same flat shape regardless of how much was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInfo {
    pub isbn_10: Option<String>,
    pub isbn_13: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub authors_or_editors: Option<Vec<String>>,
    pub year_of_publication: Option<String>,
    pub cover_image_url: Option<String>,
    pub source: Source,
}

impl BookInfo {
    /// A record carrying only its provenance tag.
    pub fn empty(source: Source) -> Self {
        Self {
            isbn_10: None,
            isbn_13: None,
            title: None,
            subtitle: None,
            authors_or_editors: None,
            year_of_publication: None,
            cover_image_url: None,
            source,
        }
    }

    pub fn first_author(&self) -> Option<&str> {
        self.authors_or_editors
            .as_ref()
            .and_then(|authors| authors.first())
            .map(String::as_str)
    }
}
