use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use zip::ZipArchive;

use super::FileMetadata;
use crate::error::{ResolveError, Result};
use crate::identifiers::isbn::normalize_isbn;

static FULL_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"full-path\s*=\s*["']([^"']+)["']"#).expect("valid regex"));
static XML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static ATTRIBUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid regex")
});
static META_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(?:opf:)?meta\b[^>]*>").expect("valid regex"));
static ITEM_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(?:opf:)?item\b[^>]*>").expect("valid regex"));
static DC_IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| dc_element_regex("identifier"));
static DC_TITLE_RE: Lazy<Regex> = Lazy::new(|| dc_element_regex("title"));
static DC_CREATOR_RE: Lazy<Regex> = Lazy::new(|| dc_element_regex("creator"));

fn dc_element_regex(name: &str) -> Regex {
    Regex::new(&format!(r"(?is)<dc:{name}\b[^>]*>(.*?)</dc:{name}>")).expect("valid regex")
}

type EpubArchive = ZipArchive<File>;

/// `dc:identifier` (as ISBN), first `dc:title` and first `dc:creator`.
pub fn read_metadata(epub_path: &Path) -> Result<FileMetadata> {
    let mut archive = open_archive(epub_path)?;
    let opf_path = locate_opf(&mut archive)?;
    let opf_xml = read_entry_to_string(&mut archive, &opf_path)?;
    Ok(parse_opf_metadata(&opf_xml))
}

/// Bytes of the declared cover image, or of the first manifest image when
/// no cover is declared. A declared cover whose item is missing yields `None`.
pub fn read_cover(epub_path: &Path) -> Result<Option<Vec<u8>>> {
    let mut archive = open_archive(epub_path)?;
    let opf_path = locate_opf(&mut archive)?;
    let opf_xml = read_entry_to_string(&mut archive, &opf_path)?;

    let Some(href) = cover_href(&opf_xml) else {
        return Ok(None);
    };
    let entry = resolve_href(&opf_path, &href);
    let mut file = archive
        .by_name(&entry)
        .map_err(|e| ResolveError::EpubExtraction(format!("missing cover entry {entry}: {e}")))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

fn open_archive(epub_path: &Path) -> Result<EpubArchive> {
    let file = File::open(epub_path).map_err(|e| {
        ResolveError::EpubExtraction(format!("failed to open {}: {e}", epub_path.display()))
    })?;
    ZipArchive::new(file).map_err(|e| ResolveError::EpubExtraction(format!("invalid EPUB ZIP: {e}")))
}

fn locate_opf(archive: &mut EpubArchive) -> Result<String> {
    let from_container = read_entry_to_string(archive, "META-INF/container.xml")
        .ok()
        .and_then(|xml| parse_container_full_path(&xml));
    from_container
        .or_else(|| {
            archive
                .file_names()
                .find(|name| name.to_ascii_lowercase().ends_with(".opf"))
                .map(ToOwned::to_owned)
        })
        .ok_or_else(|| ResolveError::EpubExtraction("no OPF package document".to_string()))
}

fn read_entry_to_string(archive: &mut EpubArchive, path: &str) -> Result<String> {
    let mut entry = archive
        .by_name(path)
        .map_err(|e| ResolveError::EpubExtraction(format!("missing EPUB entry {path}: {e}")))?;
    let mut buffer = String::new();
    entry.read_to_string(&mut buffer).map_err(|e| {
        ResolveError::EpubExtraction(format!("failed to read EPUB entry {path}: {e}"))
    })?;
    Ok(buffer)
}

fn parse_container_full_path(container_xml: &str) -> Option<String> {
    FULL_PATH_RE
        .captures(container_xml)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub(crate) fn parse_opf_metadata(opf_xml: &str) -> FileMetadata {
    let isbn = capture_all_tags(opf_xml, &DC_IDENTIFIER_RE)
        .into_iter()
        .rev()
        .find_map(|value| identifier_as_isbn(&value));

    FileMetadata {
        title: capture_all_tags(opf_xml, &DC_TITLE_RE).into_iter().next(),
        author: capture_all_tags(opf_xml, &DC_CREATOR_RE).into_iter().next(),
        isbn,
    }
}

fn identifier_as_isbn(value: &str) -> Option<String> {
    let lower = value.to_ascii_lowercase();
    let stripped = ["urn:isbn:", "isbn:"]
        .iter()
        .find_map(|prefix| lower.starts_with(prefix).then(|| &value[prefix.len()..]))
        .unwrap_or(value);
    let isbn = normalize_isbn(stripped.trim());
    let well_formed = match isbn.len() {
        13 => isbn.bytes().all(|b| b.is_ascii_digit()),
        10 => {
            isbn.bytes().take(9).all(|b| b.is_ascii_digit())
                && isbn.ends_with(|c: char| c.is_ascii_digit() || c == 'X')
        }
        _ => false,
    };
    well_formed.then_some(isbn)
}

fn cover_href(opf_xml: &str) -> Option<String> {
    let items: Vec<HashMap<String, String>> = ITEM_TAG_RE
        .find_iter(opf_xml)
        .map(|m| parse_attributes(m.as_str()))
        .collect();

    let cover_id = META_TAG_RE
        .find_iter(opf_xml)
        .map(|m| parse_attributes(m.as_str()))
        .find(|attrs| attrs.get("name").map(String::as_str) == Some("cover"))
        .and_then(|attrs| attrs.get("content").cloned());

    let item = match cover_id {
        Some(id) => items
            .iter()
            .find(|attrs| attrs.get("id") == Some(&id))?,
        None => items.iter().find(|attrs| {
            attrs
                .get("media-type")
                .is_some_and(|media| media.starts_with("image/"))
        })?,
    };
    item.get("href").cloned()
}

fn parse_attributes(tag: &str) -> HashMap<String, String> {
    ATTRIBUTE_RE
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
            Some((name, decode_entities(value)))
        })
        .collect()
}

/// Manifest hrefs are percent-encoded and relative to the OPF document's
/// directory; ZIP entry names are not encoded.
fn resolve_href(opf_path: &str, href: &str) -> String {
    let mut segments: Vec<String> = match opf_path.rsplit_once('/') {
        Some((dir, _)) => dir
            .split('/')
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
        None => Vec::new(),
    };
    let path = href.split(['#', '?']).next().unwrap_or_default();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(
                urlencoding::decode(other)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| other.to_string()),
            ),
        }
    }
    segments.join("/")
}

fn capture_all_tags(xml: &str, re: &Regex) -> Vec<String> {
    re.captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_entities(&XML_TAG_RE.replace_all(m.as_str(), "")))
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
