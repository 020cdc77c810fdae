use http::StatusCode;
use thiserror::Error;

/// Possible errors when resolving capacities with `headroom_lib`
///
/// A failed test request is never reported through this type: it only lowers
/// the success count of its probe batch.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The search provider could not be reached
    #[error("Network error while querying the search provider: {0}")]
    Transport(#[source] reqwest::Error),

    /// The search provider answered with something other than `200 OK`
    #[error("Invalid response from the search provider: {0}")]
    InvalidResponse(StatusCode),

    /// The search results page could not be parsed
    #[error("Cannot parse search results: {0}")]
    Parse(String),

    /// The shared cancellation token fired before the deadline
    #[error("Resolution was cancelled before the deadline")]
    Cancelled,

    /// The HTTP client could not be constructed
    #[error("Error creating request client: {0}")]
    BuildClient(#[source] reqwest::Error),

    /// A configured header value is not a valid HTTP header value
    #[error("Header could not be parsed.")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// The configured search URL is not a valid absolute URL
    #[error("Invalid search URL: {0}")]
    InvalidSearchUrl(#[from] url::ParseError),
}

impl ErrorKind {
    /// Returns `true` if the error was caused by cancellation rather than a
    /// failure of the search provider
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
