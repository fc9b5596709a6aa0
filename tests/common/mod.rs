//! Shared helpers for the client integration tests.
//!
//! The client is blocking while wiremock is async, so every client call
//! runs on tokio's blocking pool via [`blocking`].
#![allow(dead_code)] // Not every suite uses every helper.

use api_test_client::{ApiBase, ClientConfig, UserApi};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "JWT test-token";

/// Run a blocking closure off the async runtime and return its result.
pub async fn blocking<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task panicked")
}

/// Mount an auth endpoint for `login_type` that always hands out `token`.
pub async fn mount_login(server: &MockServer, login_type: &str, token: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/authenticate_{}", login_type)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": token })))
        .mount(server)
        .await;
}

/// A user client for `server` that has already logged in with [`TOKEN`].
/// Only move it into [`blocking`] closures afterwards.
pub async fn logged_in_user(server: &MockServer) -> UserApi {
    mount_login(server, "user", TOKEN).await;
    let uri = server.uri();
    blocking(move || {
        let mut api = UserApi::new(uri, "alice").expect("client");
        api.authenticate().expect("login");
        api
    })
    .await
}

/// A client of `login_type` for the server at `uri`, not yet logged in.
/// Call it inside [`blocking`]: the blocking reqwest client must not be
/// created or dropped on an async worker.
pub fn client(uri: &str, login_type: &str) -> ApiBase {
    ApiBase::new(ClientConfig::new(login_type, uri, "alice").with_password("pw"))
        .expect("client")
}

/// Body of the first received request whose path is `request_path`.
pub async fn received_body(server: &MockServer, request_path: &str) -> Vec<u8> {
    server
        .received_requests()
        .await
        .expect("request recording enabled")
        .into_iter()
        .find(|r| r.url.path() == request_path)
        .map(|r| r.body)
        .unwrap_or_else(|| panic!("no request to {}", request_path))
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
