use async_trait::async_trait;
use http::StatusCode;
use log::debug;
use url::Url;

use crate::{ErrorKind, Result};

mod extract;

use extract::extract_result_urls;

/// Default search endpoint, the mobile Yandex results page for Moscow
/// with 50 results per page.
pub const DEFAULT_SEARCH_URL: &str = "https://yandex.ru/search/touch/?service=www.yandex&ui=webmobileapp.yandex&numdoc=50&lr=213&p=0";

/// Name of the query parameter carrying the search text
const TEXT_PARAM: &str = "text";

/// Turns a free-text query into a list of candidate URLs.
#[async_trait]
pub trait QueryProvider: Send + Sync {
    /// Run `text` against the provider and return the URLs it found.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider could not be reached, answered with
    /// an unexpected status or returned a payload which cannot be parsed.
    async fn query(&self, text: &str) -> Result<Vec<String>>;
}

/// [`QueryProvider`] which scrapes the links off a search engine results page.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: reqwest::Client,
    base: Url,
}

impl SearchClient {
    /// Create a search client for the results page at `base`.
    ///
    /// The query text is appended to `base` as the `text` parameter, next to
    /// whatever parameters `base` already carries.
    #[must_use]
    pub const fn new(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    /// Create a search client from a string URL
    ///
    /// # Errors
    ///
    /// Returns an error if `base` is not a valid absolute URL.
    pub fn parse(client: reqwest::Client, base: &str) -> Result<Self> {
        Ok(Self::new(client, Url::parse(base)?))
    }

    fn request_url(&self, text: &str) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair(TEXT_PARAM, text);
        url
    }
}

#[async_trait]
impl QueryProvider for SearchClient {
    async fn query(&self, text: &str) -> Result<Vec<String>> {
        let url = self.request_url(text);
        debug!("Querying search provider: {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ErrorKind::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ErrorKind::InvalidResponse(status));
        }

        let body = response.bytes().await.map_err(ErrorKind::Transport)?;
        let html = std::str::from_utf8(&body).map_err(|e| ErrorKind::Parse(e.to_string()))?;
        if html.trim().is_empty() {
            return Err(ErrorKind::Parse("empty results page".to_string()));
        }

        let urls = extract_result_urls(html, self.base.host_str());
        debug!("Search for {text:?} returned {} URLs", urls.len());
        Ok(urls)
    }
}
