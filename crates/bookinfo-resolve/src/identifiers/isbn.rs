use once_cell::sync::Lazy;
use regex::Regex;

// Both patterns are anchored and applied at every candidate start position;
// the digit boundary on either side is enforced by `find_isbn_spans`.

/// `978`/`979` followed by ten digits, each optionally preceded by one separator.
static ISBN13_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^97[89](?:[- ]?[0-9]){10}").expect("valid regex"));

/// Nine digits and a check character (digit or X), single separators allowed.
static ISBN10_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9](?:[- ]?[0-9]){8}[- ]?[0-9Xx]").expect("valid regex"));

/// A candidate ISBN span inside a larger text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawIdentifierMatch<'a> {
    pub start: usize,
    pub end: usize,
    pub raw: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsbnKind {
    Isbn10,
    Isbn13,
}

impl IsbnKind {
    fn regex(self) -> &'static Regex {
        match self {
            Self::Isbn10 => &ISBN10_REGEX,
            Self::Isbn13 => &ISBN13_REGEX,
        }
    }

    pub fn expected_len(self) -> usize {
        match self {
            Self::Isbn10 => 10,
            Self::Isbn13 => 13,
        }
    }
}

/// Remove hyphens and spaces, uppercase the check character.
pub fn normalize_isbn(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '-' && *c != ' ')
        .collect::<String>()
        .to_uppercase()
}

/// Leftmost, non-overlapping ISBN spans of one kind, in order of appearance.
///
/// A span never starts right after a digit and never ends right before one.
pub fn find_isbn_spans(text: &str, kind: IsbnKind) -> Vec<RawIdentifierMatch<'_>> {
    let regex = kind.regex();
    let mut matches = Vec::new();
    let mut prev: Option<char> = None;
    let mut resume = 0usize;

    for (start, c) in text.char_indices() {
        let after_digit = prev.is_some_and(|p| p.is_ascii_digit());
        prev = Some(c);
        if start < resume || after_digit || !c.is_ascii_digit() {
            continue;
        }

        let Some(m) = regex.find(&text[start..]) else {
            continue;
        };
        let end = start + m.end();
        if text[end..].chars().next().is_some_and(|n| n.is_ascii_digit()) {
            continue;
        }

        matches.push(RawIdentifierMatch {
            start,
            end,
            raw: &text[start..end],
        });
        resume = end;
    }

    matches
}

fn extract_kind(text: &str, kind: IsbnKind) -> Vec<String> {
    find_isbn_spans(text, kind)
        .into_iter()
        .map(|m| normalize_isbn(m.raw))
        .filter(|isbn| isbn.len() == kind.expected_len())
        .collect()
}

/// Extract `(isbn10s, isbn13s)` from free text, normalized and in order of
/// appearance. Duplicates are kept.
pub fn extract_isbns(text: &str) -> (Vec<String>, Vec<String>) {
    (
        extract_kind(text, IsbnKind::Isbn10),
        extract_kind(text, IsbnKind::Isbn13),
    )
}

/// Pick the identifier to query with: first ISBN-13, else first ISBN-10.
pub fn preferred_isbn(isbn10s: &[String], isbn13s: &[String]) -> Option<String> {
    isbn13s.first().or_else(|| isbn10s.first()).cloned()
}

/// Delete every span of `kind` from `text`.
pub(crate) fn remove_isbn_spans(text: &str, kind: IsbnKind) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in find_isbn_spans(text, kind) {
        out.push_str(&text[last..m.start]);
        last = m.end;
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(text: &str) {
        let (isbn10s, isbn13s) = extract_isbns(text);
        for isbn in &isbn10s {
            assert_eq!(isbn.len(), 10, "{isbn} from {text:?}");
            assert!(isbn[..9].chars().all(|c| c.is_ascii_digit()));
            let check = isbn.chars().last().unwrap();
            assert!(check.is_ascii_digit() || check == 'X', "{isbn}");
        }
        for isbn in &isbn13s {
            assert_eq!(isbn.len(), 13, "{isbn} from {text:?}");
            assert!(isbn.starts_with("978") || isbn.starts_with("979"));
            assert!(isbn.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn plain_isbns() {
        let (isbn10s, isbn13s) =
            extract_isbns("This is a test with ISBN 9781234567890 and 123456789X.");
        assert!(isbn10s.contains(&"123456789X".to_string()));
        assert_eq!(isbn13s, vec!["9781234567890"]);
    }

    #[test]
    fn hyphenated_isbns() {
        let (isbn10s, isbn13s) = extract_isbns("ISBN 978-1-2345-6789-0 and 1-23456789-X");
        assert_eq!(isbn13s, vec!["9781234567890"]);
        // The separator-broken tail of the ISBN-13 is itself a valid ISBN-10 span.
        assert_eq!(isbn10s, vec!["1234567890", "123456789X"]);
    }

    #[test]
    fn space_separated_isbns() {
        let (isbn10s, isbn13s) = extract_isbns("ISBN 978 1 2345 6789 0 and 1 23456789 X");
        assert_eq!(isbn13s, vec!["9781234567890"]);
        assert!(isbn10s.contains(&"123456789X".to_string()));
    }

    #[test]
    fn lowercase_check_character_is_uppercased() {
        let (isbn10s, _) = extract_isbns("isbn 080442957x");
        assert_eq!(isbn10s, vec!["080442957X"]);
    }

    #[test]
    fn digit_boundaries_are_respected() {
        let (isbn10s, isbn13s) = extract_isbns("id 97812345678901 end");
        assert!(isbn13s.is_empty());
        assert!(isbn10s.is_empty());

        let (isbn10s, isbn13s) = extract_isbns("12345678901");
        assert!(isbn10s.is_empty());
        assert!(isbn13s.is_empty());
    }

    #[test]
    fn double_separators_break_a_match() {
        let (isbn10s, isbn13s) = extract_isbns("978--1234567890");
        assert!(isbn13s.is_empty());
        assert_eq!(isbn10s, vec!["1234567890"]);
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let (_, isbn13s) =
            extract_isbns("9780306406157 then 9791032305690 then 978-0-306-40615-7");
        assert_eq!(
            isbn13s,
            vec!["9780306406157", "9791032305690", "9780306406157"]
        );
    }

    #[test]
    fn empty_and_noise_inputs() {
        assert_eq!(extract_isbns(""), (Vec::new(), Vec::new()));
        for text in [
            "no numbers here",
            "1-2-3-4-5-6-7-8-9-X-1",
            "ébook 978‐0‐306‐40615‐7 unicode dashes",
            "--- 0 3 0 6 4 0 6 1 5 2 ---",
            "X123456789 9780306406157X 979 1 0 3 2 3 0 5 6 9 0",
            "٩٧٨٠٣٠٦٤٠٦١٥٧",
        ] {
            assert_well_formed(text);
        }
    }

    #[test]
    fn preferred_isbn_favours_isbn13() {
        let ten = vec!["0306406152".to_string()];
        let thirteen = vec!["9780306406157".to_string()];
        assert_eq!(
            preferred_isbn(&ten, &thirteen).as_deref(),
            Some("9780306406157")
        );
        assert_eq!(preferred_isbn(&ten, &[]).as_deref(), Some("0306406152"));
        assert_eq!(preferred_isbn(&[], &[]), None);
    }

    #[test]
    fn remove_spans_keeps_surrounding_text() {
        assert_eq!(
            remove_isbn_spans("a 978-0-306-40615-7 b", IsbnKind::Isbn13),
            "a  b"
        );
        assert_eq!(remove_isbn_spans("nothing", IsbnKind::Isbn10), "nothing");
    }
}
