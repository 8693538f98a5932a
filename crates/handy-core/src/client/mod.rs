//! HTTP client for the marketplace API.
//!
//! One `send` per user action: builds the wire request (JSON, form or
//! multipart), attaches credentials, and classifies the response. Never
//! retries.

mod outcome;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, HeaderValue, SET_COOKIE};
use reqwest::multipart;
use reqwest::{Method, Url};
use serde_json::Value;

pub use outcome::{ApiError, Outcome, SubmissionResult, classify};

use crate::blob::Blob;
use crate::config::Config;
use crate::session::{SessionKey, SessionStore};

/// Standard User-Agent header for handy API requests.
pub const USER_AGENT: &str = concat!("handy/", env!("CARGO_PKG_VERSION"));

/// Characters left as-is in a path segment (RFC 3986 unreserved).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes a value (usually an id) for use as one path segment.
///
/// `/`, `?` and `#` are escaped, so the value cannot leave its segment.
pub fn path_segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

/// How a request proves who is calling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    None,
    /// `Authorization: Bearer <accessToken>` when a token is stored
    Bearer,
    /// Cookies from the client's jar (or the stored `cookie` slot)
    Cookie,
}

/// One multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    File(Blob),
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// `application/x-www-form-urlencoded`; every pair is sent, empty or not
    Form(Vec<(String, String)>),
    /// Parts in order; a field name may repeat
    Multipart(Vec<(String, Part)>),
}

/// Transport-agnostic description of one API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API base URL, e.g. `/api/providers`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub auth: AuthMode,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            auth: AuthMode::None,
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, value: Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    #[must_use]
    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn multipart(mut self, parts: Vec<(String, Part)>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }
}

/// Sends [`ApiRequest`]s to the API server.
///
/// Cheap to clone; clones share the connection pool, cookie jar and session.
#[derive(Clone)]
pub struct RequestClient {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<dyn SessionStore>,
    jar: Arc<Jar>,
}

impl RequestClient {
    /// Creates a client for `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, session: Arc<dyn SessionStore>) -> Result<Self> {
        Self::build(base_url, session, None)
    }

    /// Creates a client from configuration (base URL, timeout).
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn from_config(config: &Config, session: Arc<dyn SessionStore>) -> Result<Self> {
        let base_url = config.effective_api_base_url()?;
        Self::build(&base_url, session, config.request_timeout())
    }

    fn build(
        base_url: &str,
        session: Arc<dyn SessionStore>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("Invalid API base URL: {base_url}"))?;

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            session,
            jar: Arc::new(Jar::default()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// Resolves a server-relative asset path (e.g. a provider's
    /// `profile_photo`) against the API origin. Absolute URLs pass through.
    pub fn asset_url(&self, path: &str) -> Option<String> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }
        if let Ok(absolute) = Url::parse(path) {
            return Some(absolute.to_string());
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        if path.starts_with('/') {
            Some(format!("{base}{path}"))
        } else {
            Some(format!("{base}/{path}"))
        }
    }

    /// Joins `path` onto the base URL. Paths that the URL parser would
    /// rewrite (dot segments, stray `?` or `#`) are refused.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let relative = path.trim_start_matches('/');
        let url = Url::parse(&format!("{base}/{relative}"))
            .with_context(|| format!("Invalid request path: {path}"))?;

        let expected = format!("{}/{relative}", self.base_url.path().trim_end_matches('/'));
        if url.path() != expected || url.query().is_some() || url.fragment().is_some() {
            bail!("Invalid request path: {path}");
        }
        Ok(url)
    }

    fn cookie_header(&self, url: &Url) -> Option<HeaderValue> {
        if let Some(value) = self.jar.cookies(url) {
            return Some(value);
        }
        self.session
            .get(SessionKey::Cookie)
            .and_then(|raw| HeaderValue::from_str(raw.trim()).ok())
    }

    /// Sends one request and classifies the response. Fire-once.
    pub async fn send(&self, request: ApiRequest) -> SubmissionResult {
        let url = match self.endpoint(&request.path) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(path = %request.path, "request refused: {err:#}");
                return SubmissionResult::invalid(format!("{err:#}"));
            }
        };

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            auth = ?request.auth,
            "sending request"
        );

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .header(ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        match request.auth {
            AuthMode::None => {}
            AuthMode::Bearer => match self.session.get(SessionKey::AccessToken) {
                Some(token) => builder = builder.bearer_auth(token),
                None => tracing::debug!("no access token stored; sending without Authorization"),
            },
            AuthMode::Cookie => {
                if let Some(cookie) = self.cookie_header(&url) {
                    builder = builder.header(COOKIE, cookie);
                }
            }
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(pairs) => builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encode_form(&pairs)),
            RequestBody::Multipart(parts) => match build_multipart(parts) {
                Ok(form) => builder.multipart(form),
                Err(err) => {
                    return SubmissionResult::invalid(format!("Failed to build upload: {err}"));
                }
            },
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(path = %request.path, "transport failure: {err}");
                return SubmissionResult::network(describe_transport_error(&err));
            }
        };

        let mut set_cookies = response.headers().get_all(SET_COOKIE).iter();
        self.jar.set_cookies(&mut set_cookies, &url);

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => return SubmissionResult::network(describe_transport_error(&err)),
        };

        let result = classify(status, &body);
        tracing::debug!(path = %request.path, status, outcome = %result.outcome, "response classified");
        result
    }
}

fn encode_form(pairs: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn build_multipart(parts: Vec<(String, Part)>) -> Result<multipart::Form, reqwest::Error> {
    let mut form = multipart::Form::new();
    for (name, part) in parts {
        form = match part {
            Part::Text(value) => form.text(name, value),
            Part::File(blob) => {
                let file = multipart::Part::bytes(blob.bytes)
                    .file_name(blob.file_name)
                    .mime_str(&blob.mime_type)?;
                form.part(name, file)
            }
        };
    }
    Ok(form)
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "The server took too long to respond".to_string()
    } else if err.is_connect() {
        "Could not connect to the server".to_string()
    } else {
        format!("Network error: {err}")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;
    use crate::blob::testing::png;
    use crate::session::MemorySessionStore;

    fn client_for(server: &MockServer, store: Arc<MemorySessionStore>) -> RequestClient {
        RequestClient::new(&server.uri(), store).unwrap()
    }

    fn has_header(request: &Request, name: &str) -> bool {
        request.headers.contains_key(name)
    }

    #[tokio::test]
    async fn test_json_body_and_ok_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/providers/register"))
            .and(header("content-type", "application/json"))
            .and(header("accept", "application/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"provider_id": "p1", "access_token": "tok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySessionStore::new()));
        let result = client
            .send(
                ApiRequest::post("/api/providers/register")
                    .json(json!({"full_name": "A", "email": "a@b.com", "password": "x"})),
            )
            .await;

        assert_eq!(result.outcome, Outcome::Ok);
        assert_eq!(result.payload_str("provider_id").as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn test_bearer_attached_when_token_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/providers/p1"))
            .and(header("authorization", "Bearer stored-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p1"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemorySessionStore::new());
        store.set(SessionKey::AccessToken, "stored-token").unwrap();
        let client = client_for(&server, store);

        let result = client
            .send(ApiRequest::get("/api/providers/p1").auth(AuthMode::Bearer))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bearer_omitted_when_token_absent_and_401_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/providers/p1"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": "Not authenticated"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySessionStore::new()));
        let result = client
            .send(ApiRequest::get("/api/providers/p1").auth(AuthMode::Bearer))
            .await;

        assert_eq!(result.outcome, Outcome::AuthError);
        let requests = server.received_requests().await.unwrap();
        assert!(!has_header(&requests[0], "authorization"));
    }

    #[tokio::test]
    async fn test_form_body_keeps_empty_pairs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/providers/login"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string(
                "grant_type=&username=a%40b.com&password=x&scope=&client_id=&client_secret=",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySessionStore::new()));
        let result = client
            .send(ApiRequest::post("/api/providers/login").form([
                ("grant_type", ""),
                ("username", "a@b.com"),
                ("password", "x"),
                ("scope", ""),
                ("client_id", ""),
                ("client_secret", ""),
            ]))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_multipart_repeats_attachment_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/me/bookings"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySessionStore::new()));
        let parts = vec![
            ("date".to_string(), Part::Text("2025-01-10".to_string())),
            ("images".to_string(), Part::File(png("one.png"))),
            ("images".to_string(), Part::File(png("two.png"))),
        ];
        let result = client
            .send(ApiRequest::post("/api/me/bookings").multipart(parts))
            .await;
        assert!(result.is_ok());
        assert_eq!(result.payload, None);

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"date\""));
        assert!(body.contains("2025-01-10"));
        assert_eq!(body.matches("name=\"images\"").count(), 2);
        assert!(body.contains("filename=\"one.png\""));
        assert!(body.contains("filename=\"two.png\""));
        assert!(body.contains("image/png"));
        let content_type = requests[0].headers.get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().starts_with("multipart/form-data"));
    }

    #[tokio::test]
    async fn test_cookie_mode_replays_server_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "session=abc123; Path=/")
                    .set_body_json(json!({})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/me/bookings"))
            .and(header("cookie", "session=abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySessionStore::new()));
        client.send(ApiRequest::post("/api/users/login")).await;
        let result = client
            .send(ApiRequest::get("/api/me/bookings").auth(AuthMode::Cookie))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cookie_mode_falls_back_to_session_slot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/me/bookings"))
            .and(header("cookie", "session=from-store"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemorySessionStore::new());
        store.set(SessionKey::Cookie, "session=from-store").unwrap();
        let client = client_for(&server, store);

        let result = client
            .send(ApiRequest::get("/api/me/bookings").auth(AuthMode::Cookie))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cookies_not_sent_without_cookie_mode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let store = Arc::new(MemorySessionStore::new());
        store.set(SessionKey::Cookie, "session=from-store").unwrap();
        let client = client_for(&server, store);
        client.send(ApiRequest::get("/api/providers")).await;

        let requests = server.received_requests().await.unwrap();
        assert!(!has_header(&requests[0], "cookie"));
    }

    #[tokio::test]
    async fn test_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/me/bookings/b1/status"))
            .and(query_param("status", "accepted"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "accepted"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySessionStore::new()));
        let result = client
            .send(ApiRequest::patch("/api/me/bookings/b1/status").query("status", "accepted"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_never_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/providers"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySessionStore::new()));
        let result = client.send(ApiRequest::get("/api/providers")).await;
        assert_eq!(result.outcome, Outcome::ServerError);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let uri = format!("http://127.0.0.1:{port}");

        let client = RequestClient::new(&uri, Arc::new(MemorySessionStore::new())).unwrap();
        let result = client.send(ApiRequest::get("/api/providers")).await;
        assert_eq!(result.outcome, Outcome::NetworkError);
        assert_eq!(result.status, None);
        assert!(result.message.is_some());
    }

    #[test]
    fn test_path_segment_escapes_separators() {
        assert_eq!(path_segment("p-1_a.b~c"), "p-1_a.b~c");
        assert_eq!(path_segment("../users"), "..%2Fusers");
        assert_eq!(path_segment("p1?admin=1"), "p1%3Fadmin%3D1");
        assert_eq!(path_segment("a#b c"), "a%23b%20c");
        assert_eq!(path_segment("100%"), "100%25");
    }

    #[tokio::test]
    async fn test_rewritten_paths_are_refused_without_a_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySessionStore::new()));
        for raw in ["/api/providers/..", "/api/providers/p1?admin=1", "/api/providers/p1#x"] {
            let result = client.send(ApiRequest::get(raw)).await;
            assert_eq!(result.outcome, Outcome::ValidationError, "{raw}");
            assert_eq!(result.status, None);
        }
    }

    #[tokio::test]
    async fn test_bad_upload_mime_is_refused_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let mut blob = png("odd.png");
        blob.mime_type = "not a mime".to_string();
        let client = client_for(&server, Arc::new(MemorySessionStore::new()));
        let result = client
            .send(
                ApiRequest::post("/api/me/bookings")
                    .multipart(vec![("images".to_string(), Part::File(blob))]),
            )
            .await;

        assert_eq!(result.outcome, Outcome::ValidationError);
        assert!(result.message.unwrap().contains("Failed to build upload"));
    }

    #[test]
    fn test_asset_url_resolution() {
        let client = RequestClient::new(
            "http://127.0.0.1:8000/",
            Arc::new(MemorySessionStore::new()),
        )
        .unwrap();
        assert_eq!(
            client.asset_url("/uploads/p1.png").as_deref(),
            Some("http://127.0.0.1:8000/uploads/p1.png")
        );
        assert_eq!(
            client.asset_url("uploads/p1.png").as_deref(),
            Some("http://127.0.0.1:8000/uploads/p1.png")
        );
        assert_eq!(
            client.asset_url("https://cdn.example.com/p.png").as_deref(),
            Some("https://cdn.example.com/p.png")
        );
        assert_eq!(client.asset_url("  "), None);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(RequestClient::new("not a url", Arc::new(MemorySessionStore::new())).is_err());
    }
}
