//! `test-utils` is used for testing in both `headroom-lib` and `headroom-bin`.
//! This crate does not depend on `headroom-lib` or `headroom-bin`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Create a mock web server, which responds with a predefined status when
/// handling a matching request
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Create a mock server which returns a 200 OK and a custom response body.
#[macro_export]
macro_rules! mock_response {
    ($body:expr) => {{
        let mock_server = wiremock::MockServer::start().await;
        let template = wiremock::ResponseTemplate::new(200).set_body_string($body);
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(template)
            .mount(&mock_server)
            .await;
        mock_server
    }};
}

/// Gets the "main" binary name (e.g. `headroom`)
#[macro_export]
macro_rules! main_command {
    () => {
        assert_cmd::Command::cargo_bin(env!("CARGO_PKG_NAME"))
            .expect("Couldn't get cargo package name")
    };
}
