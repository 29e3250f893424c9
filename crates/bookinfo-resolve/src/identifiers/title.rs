use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::identifiers::isbn::{IsbnKind, remove_isbn_spans};

static SEPARATOR_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_\-]+").expect("valid regex"));

/// Derive a search title from a file name.
///
/// Strips directories and the extension, removes ISBN-13 then ISBN-10
/// spans, turns `_`/`-` runs into spaces and collapses whitespace. An empty
/// result means nothing usable was left.
pub fn clean_title_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let without_isbn13 = remove_isbn_spans(&stem, IsbnKind::Isbn13);
    let without_isbns = remove_isbn_spans(&without_isbn13, IsbnKind::Isbn10);
    let spaced = SEPARATOR_RUN_RE.replace_all(&without_isbns, " ");

    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_isbn13_and_separators() {
        assert_eq!(
            clean_title_from_filename("9781234567890_The_Great_Book-2021.pdf"),
            "The Great Book 2021"
        );
    }

    #[test]
    fn strips_directories_and_hyphenated_isbn10() {
        assert_eq!(
            clean_title_from_filename("/books/in/Clean-Code__A_Handbook 0-13-235088-2.epub"),
            "Clean Code A Handbook"
        );
    }

    #[test]
    fn isbn_only_name_is_empty() {
        assert_eq!(clean_title_from_filename("978-0-306-40615-7.pdf"), "");
        assert_eq!(clean_title_from_filename("___.epub"), "");
        assert_eq!(clean_title_from_filename(""), "");
    }

    #[test]
    fn keeps_short_numbers_and_inner_dots() {
        assert_eq!(
            clean_title_from_filename("Rust  in   Action v2.0 (2nd ed).pdf"),
            "Rust in Action v2.0 (2nd ed)"
        );
    }

    #[test]
    fn only_last_extension_is_removed() {
        assert_eq!(clean_title_from_filename("notes.tar.pdf"), "notes.tar");
    }
}
