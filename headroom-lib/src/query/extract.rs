use std::collections::{HashMap, HashSet};

use html5gum::{
    Tokenizer,
    emitters::callback::{Callback, CallbackEmitter, CallbackEvent},
};
use url::Url;

/// Collects the targets of all hyperlinks on a search results page.
///
/// Only `href` attributes of `<a>` elements are considered. Everything else
/// on the page (scripts, stylesheets, images) is not a search result.
#[derive(Debug, Default)]
struct ResultExtractor {
    /// Link targets in document order
    links: Vec<String>,
    /// Current element name being processed.
    /// This is called a tag in html5gum.
    current_element: String,
    current_attribute_name: String,
    current_attributes: HashMap<String, String>,
}

impl ResultExtractor {
    fn flush_link(&mut self) {
        if self.current_element == "a"
            && let Some(href) = self.current_attributes.remove("href")
        {
            self.links.push(href);
        }
        self.current_attributes.clear();
    }
}

impl Callback<(), usize> for &mut ResultExtractor {
    fn handle_event(
        &mut self,
        event: CallbackEvent<'_>,
        _span: html5gum::Span<usize>,
    ) -> Option<()> {
        match event {
            CallbackEvent::OpenStartTag { name } => {
                self.current_element = String::from_utf8_lossy(name).to_ascii_lowercase();
            }
            CallbackEvent::AttributeName { name } => {
                self.current_attribute_name = String::from_utf8_lossy(name).to_ascii_lowercase();
            }
            CallbackEvent::AttributeValue { value } => {
                let value = String::from_utf8_lossy(value);
                self.current_attributes
                    .entry(self.current_attribute_name.clone())
                    .and_modify(|v| v.push_str(&value))
                    .or_insert_with(|| value.into_owned());
            }
            CallbackEvent::CloseStartTag { .. } => self.flush_link(),
            CallbackEvent::EndTag { .. }
            | CallbackEvent::String { .. }
            | CallbackEvent::Comment { .. }
            | CallbackEvent::Doctype { .. }
            | CallbackEvent::Error(_) => {}
        }
        None
    }
}

/// Extract the URLs of search results from an HTML page.
///
/// A link counts as a result if it is an absolute `http` or `https` URL
/// pointing away from `own_host` (the search provider itself, including its
/// subdomains). Results are returned in document order without duplicates.
pub(crate) fn extract_result_urls(html: &str, own_host: Option<&str>) -> Vec<String> {
    let mut extractor = ResultExtractor::default();
    let mut tokenizer = Tokenizer::new_with_emitter(html, CallbackEmitter::new(&mut extractor));
    assert!(tokenizer.next().is_none());

    let mut seen = HashSet::new();
    extractor
        .links
        .iter()
        .filter_map(|href| Url::parse(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter(|url| !is_own_host(url, own_host))
        .map(String::from)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn is_own_host(url: &Url, own_host: Option<&str>) -> bool {
    match (url.host_str(), own_host) {
        (Some(host), Some(own)) => {
            host == own
                || host
                    .strip_suffix(own)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        (None, _) => true,
        (Some(_), None) => false,
    }
}
