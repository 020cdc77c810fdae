//! Construction of the HTTP client shared by the probe executor and the
//! search client.
//!
//! Both send the same charset headers and user agent, so a single
//! [`reqwest::Client`] (and its connection pool) serves them both.
#![allow(clippy::module_name_repetitions)]
use std::time::Duration;

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use typed_builder::TypedBuilder;

use crate::{ErrorKind, Result};

/// Default number of redirects before a request is deemed as failed, 10.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
/// Default user agent, `headroom-<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("headroom/", env!("CARGO_PKG_VERSION"));

// Constants currently not configurable by the user.
/// A timeout for only the connect phase of a Client.
const CONNECT_TIMEOUT: u64 = 10;
/// Non-standard header the search provider uses to pick the page encoding.
const CHARSET: HeaderName = HeaderName::from_static("charset");
const UTF8: HeaderValue = HeaderValue::from_static("utf-8");

/// Builder for the outbound [`reqwest::Client`].
///
/// ```
/// # use headroom_lib::ClientBuilder;
/// let client = ClientBuilder::builder()
///     .user_agent("my-agent/1.0")
///     .build()
///     .client()
///     .unwrap();
/// ```
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `ClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ClientBuilder`.
"))]
pub struct ClientBuilder {
    /// User-agent used for every outbound request.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,

    /// Maximum number of redirects per request before it counts as failed.
    #[builder(default = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,

    /// Accept invalid TLS certificates.
    allow_insecure: bool,
}

impl Default for ClientBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`reqwest::Client`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The user agent contains characters other than ASCII 32-127.
    /// - The reqwest client cannot be instantiated. This occurs if a TLS
    ///   backend cannot be initialized or the resolver fails to load the system
    ///   configuration. See [here].
    ///
    /// [here]: https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors
    pub fn client(self) -> Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_str(&self.user_agent)?);
        headers.insert(CHARSET, UTF8);
        headers.insert(header::ACCEPT_CHARSET, UTF8);

        reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers)
            .danger_accept_invalid_certs(self.allow_insecure)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .build()
            .map_err(ErrorKind::BuildClient)
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use test_utils::mock_server;
    use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

    use super::*;

    #[tokio::test]
    async fn test_default_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::header("user-agent", DEFAULT_USER_AGENT))
            .and(matchers::header("charset", "utf-8"))
            .and(matchers::header("accept-charset", "utf-8"))
            .respond_with(ResponseTemplate::new(StatusCode::OK))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ClientBuilder::default().client().unwrap();
        let response = client.get(mock_server.uri()).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_user_agent() {
        let mock_server = mock_server!(StatusCode::OK);
        let client = ClientBuilder::builder()
            .user_agent("probe-test/0.0")
            .build()
            .client()
            .unwrap();

        client.get(mock_server.uri()).send().await.unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests[0].headers["user-agent"], "probe-test/0.0");
    }

    #[test]
    fn test_invalid_user_agent() {
        let result = ClientBuilder::builder()
            .user_agent("bad\nagent")
            .build()
            .client();
        assert!(matches!(result, Err(ErrorKind::InvalidHeader(_))));
    }
}
