pub mod isbn;
pub mod title;

pub use isbn::{IsbnKind, RawIdentifierMatch, extract_isbns, normalize_isbn, preferred_isbn};
pub use title::clean_title_from_filename;
