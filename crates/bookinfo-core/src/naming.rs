use crate::models::BookInfo;

/// Characters that are rejected in file names on at least one major platform.
const FORBIDDEN_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

const UNKNOWN: &str = "Unknown";

impl BookInfo {
    /// Build a file name of the form
    /// `ISBN-10 - Title; Subtitle - First Author.ext`.
    ///
    /// `ext` is appended verbatim and should include the leading dot.
    pub fn file_name(&self, ext: &str) -> String {
        let isbn = non_empty(self.isbn_10.as_deref()).unwrap_or(UNKNOWN);
        let title = non_empty(self.title.as_deref()).unwrap_or(UNKNOWN);
        let author = non_empty(self.first_author()).unwrap_or(UNKNOWN);

        let name = match non_empty(self.subtitle.as_deref()) {
            Some(subtitle) => format!("{isbn} - {title}; {subtitle} - {author}{ext}"),
            None => format!("{isbn} - {title} - {author}{ext}"),
        };
        sanitize_file_name(&name)
    }
}

/// Drop characters that cannot appear in a file name and trim the result.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    fn sample() -> BookInfo {
        BookInfo {
            isbn_10: Some("0306406152".to_string()),
            isbn_13: Some("9780306406157".to_string()),
            title: Some("Signals: Theory".to_string()),
            subtitle: None,
            authors_or_editors: Some(vec!["Ada Lovelace".to_string(), "C. Babbage".to_string()]),
            year_of_publication: Some("1999".to_string()),
            cover_image_url: None,
            source: Source::IsbnFilename,
        }
    }

    #[test]
    fn test_file_name_without_subtitle() {
        assert_eq!(
            sample().file_name(".pdf"),
            "0306406152 - Signals Theory - Ada Lovelace.pdf"
        );
    }

    #[test]
    fn test_file_name_with_subtitle() {
        let mut info = sample();
        info.subtitle = Some("A \"Practical\" Guide?".to_string());
        assert_eq!(
            info.file_name(".epub"),
            "0306406152 - Signals Theory; A Practical Guide - Ada Lovelace.epub"
        );
    }

    #[test]
    fn test_file_name_unknown_fields() {
        let info = BookInfo::empty(Source::NotFound);
        assert_eq!(info.file_name(".pdf"), "Unknown - Unknown - Unknown.pdf");
    }

    #[test]
    fn test_empty_author_list_is_unknown() {
        let mut info = sample();
        info.authors_or_editors = Some(Vec::new());
        assert!(info.file_name(".pdf").ends_with("- Unknown.pdf"));
    }

    #[test]
    fn test_sanitize_strips_path_separators() {
        assert_eq!(sanitize_file_name("  a/b\\c|d  "), "abcd");
    }
}
