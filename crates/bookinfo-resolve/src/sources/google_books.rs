use async_trait::async_trait;
use bookinfo_core::{AppConfig, BookInfo, LookupConfig, RetryConfig, Source};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ResolveError, Result};
use crate::http::{RateLimitedClient, RetryPolicy};
use crate::sources::BookLookup;

const SERVICE: &str = "google_books";

// ─── Raw records ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Option<Vec<Volume>>,
}

/// One unnormalized search result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default)]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    #[serde(default)]
    pub industry_identifiers: Vec<IndustryIdentifier>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub authors: Option<Vec<String>>,
    pub published_date: Option<String>,
    pub image_links: Option<ImageLinks>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndustryIdentifier {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub identifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    pub large: Option<String>,
    pub thumbnail: Option<String>,
    pub small_thumbnail: Option<String>,
}

// ─── Normalizer ───────────────────────────────────────────────────────────────

/// Convert a raw volume into the canonical record, tagged with `source`.
pub fn normalize_volume(volume: &Volume, source: Source) -> BookInfo {
    let info = &volume.volume_info;

    let mut isbn_10 = None;
    let mut isbn_13 = None;
    for id in &info.industry_identifiers {
        match id.kind.as_str() {
            "ISBN_10" => isbn_10 = Some(id.identifier.clone()),
            "ISBN_13" => isbn_13 = Some(id.identifier.clone()),
            _ => {}
        }
    }

    let year_of_publication = info
        .published_date
        .as_deref()
        .filter(|date| !date.is_empty())
        .map(|date| date.chars().take(4).collect());

    let cover_image_url = info.image_links.as_ref().and_then(|links| {
        links
            .large
            .clone()
            .or_else(|| links.thumbnail.clone())
            .or_else(|| links.small_thumbnail.clone())
    });

    BookInfo {
        isbn_10,
        isbn_13,
        title: info.title.clone(),
        subtitle: info.subtitle.clone(),
        authors_or_editors: info.authors.clone(),
        year_of_publication,
        cover_image_url,
        source,
    }
}

// ─── Source ───────────────────────────────────────────────────────────────────

/// Google Books `volumes` search.
pub struct GoogleBooksSource {
    client: RateLimitedClient,
    retry: RetryPolicy,
    base_url: String,
    max_results: u32,
}

impl GoogleBooksSource {
    pub fn new() -> Self {
        Self::from_config(&AppConfig::default())
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_config(&config.lookup, &config.retry)
    }

    pub fn with_config(lookup: &LookupConfig, retry: &RetryConfig) -> Self {
        Self {
            client: RateLimitedClient::new(
                lookup.min_interval(),
                lookup.timeout(),
                &lookup.user_agent,
            ),
            retry: RetryPolicy::from_config(retry),
            base_url: lookup.base_url.trim_end_matches('/').to_string(),
            max_results: lookup.max_results,
        }
    }

    /// Replace the retry policy, mostly so tests do not sleep.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn volumes_url(&self, query: &str, api_key: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/volumes", self.base_url))
            .map_err(|e| ResolveError::Parse(format!("invalid Google Books base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("maxResults", &self.max_results.to_string())
            .append_pair("key", api_key);
        Ok(url)
    }

    /// One search, retried per policy. Errors surface here; the trait
    /// method converts them into `None`.
    pub async fn search(&self, query: &str, api_key: &str) -> Result<Vec<Volume>> {
        let url = self.volumes_url(query, api_key)?;
        let url = url.as_str();
        let client = &self.client;
        let response: VolumesResponse = self
            .retry
            .run(SERVICE, move || async move {
                let result = client.get_json(SERVICE, url).await;
                if let Err(ResolveError::ApiError(_, message)) = &result {
                    error!("Google Books API error: {message}");
                }
                result
            })
            .await?;
        Ok(response.items.unwrap_or_default())
    }

    /// Cover link of the best match for `query`, if any.
    pub async fn cover_image_url(&self, query: &str, api_key: &str) -> Option<String> {
        let volumes = self.query(query, api_key).await?;
        volumes
            .first()
            .and_then(|volume| normalize_volume(volume, Source::NotFound).cover_image_url)
    }
}

impl Default for GoogleBooksSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookLookup for GoogleBooksSource {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn query(&self, query: &str, api_key: &str) -> Option<Vec<Volume>> {
        debug!("Querying Google Books: {query}");
        match self.search(query, api_key).await {
            Ok(volumes) => Some(volumes),
            Err(err) => {
                error!("Google Books query {query:?} failed: {err}");
                None
            }
        }
    }
}
