//! HTTP transport for the marketplace API.
//!
//! [`ServiceClient`] issues one request at a time, optionally dumps the raw
//! exchange for diagnostics, and hands the body to the
//! [normalizer](crate::normalize) before anything else looks at it. There is no
//! retry and no timeout beyond the HTTP client's default.

use crate::config::{Credentials, MarketplaceConfig};
use crate::error::{Error, Result};
use crate::form::{FormBody, FORM_CONTENT_TYPE};
use crate::normalize::normalize;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT as USER_AGENT_HEADER};
use reqwest::{Client, Method, Request, StatusCode, Version};
use std::fmt::Write as _;
use tracing::{debug, info};
use url::Url;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("td-stream/", env!("CARGO_PKG_VERSION"));

/// Tracing target for raw request/response dumps.
pub const WIRE_TARGET: &str = "tensordock::wire";

/// HTTP client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// User agent header value
    pub user_agent: String,

    /// Dump every request and response verbatim
    pub enable_wire_dump: bool,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            enable_wire_dump: false,
        }
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable wire dumps.
    #[must_use]
    pub const fn with_wire_dump(mut self, enabled: bool) -> Self {
        self.enable_wire_dump = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ServiceClient`].
#[derive(Debug, Clone)]
pub struct ServiceClientBuilder {
    base_url: Url,
    credentials: Option<Credentials>,
    http_config: ClientConfig,
}

impl ServiceClientBuilder {
    /// Create a builder for the specified base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        // `Url::join` replaces the last segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            credentials: None,
            http_config: ClientConfig::new(),
        })
    }

    /// Create a builder from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured service URL is invalid.
    pub fn from_config(config: &MarketplaceConfig) -> Result<Self> {
        let mut builder = Self::new(config.parse_service_url()?)?.with_wire_dump(config.debug);
        if let Some(credentials) = config.credentials() {
            builder = builder.with_credentials(credentials);
        }
        Ok(builder)
    }

    /// Attach API credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Override the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.http_config = self.http_config.with_user_agent(user_agent);
        self
    }

    /// Enable or disable wire dumps.
    #[must_use]
    pub fn with_wire_dump(mut self, enabled: bool) -> Self {
        self.http_config = self.http_config.with_wire_dump(enabled);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the user agent is not a valid header value or the
    /// HTTP client cannot be constructed.
    pub fn build(self) -> Result<ServiceClient> {
        let user_agent = HeaderValue::from_str(&self.http_config.user_agent)
            .map_err(|err| Error::ConfigError(format!("Invalid user agent: {err}")))?;

        let http = Client::builder()
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))?;

        Ok(ServiceClient {
            http,
            base_url: self.base_url,
            credentials: self.credentials,
            user_agent,
            wire_dump: self.http_config.enable_wire_dump,
        })
    }
}

/// Status, content type and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// `Content-Type` header, if present and readable.
    pub content_type: Option<String>,
    /// Complete response body.
    pub body: Vec<u8>,
}

/// Low-level marketplace HTTP client.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    base_url: Url,
    credentials: Option<Credentials>,
    user_agent: HeaderValue,
    wire_dump: bool,
}

impl ServiceClient {
    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns true if API credentials are attached.
    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Issue a GET with `params` as the query string and return the normalized
    /// envelope bytes.
    ///
    /// # Errors
    ///
    /// Returns transport, decode or missing-credential errors.
    pub async fn get(&self, path: &str, params: &FormBody, auth: bool) -> Result<Vec<u8>> {
        let query = self.encode(params, auth)?;
        let response = self
            .execute(Method::GET, path, &query, self.base_headers(), None)
            .await?;
        normalize_response(&response)
    }

    /// Issue a form-encoded POST and return the normalized envelope bytes.
    ///
    /// # Errors
    ///
    /// Returns transport, decode or missing-credential errors.
    pub async fn post(&self, path: &str, body: &FormBody, auth: bool) -> Result<Vec<u8>> {
        let encoded = self.encode(body, auth)?;
        let mut headers = self.base_headers();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));

        let response = self
            .execute(Method::POST, path, "", headers, Some(encoded))
            .await?;
        normalize_response(&response)
    }

    /// Send one request and read the full response.
    ///
    /// The response is consumed before returning, on success and on error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on any network failure.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &str,
        headers: HeaderMap,
        body: Option<String>,
    ) -> Result<RawResponse> {
        let url = self.build_url(path, query)?;
        let mut request = self.http.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }
        let request = request.build()?;

        if self.wire_dump {
            info!(target: WIRE_TARGET, "\n{}", dump_request(&request));
        }
        debug!(method = %request.method(), path, "sending marketplace request");

        let response = self.http.execute(request).await?;
        let status = response.status();
        let version = response.version();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let dump_headers = self.wire_dump.then(|| response.headers().clone());

        let body = response.bytes().await?.to_vec();

        if let Some(headers) = dump_headers {
            info!(
                target: WIRE_TARGET,
                "\n{}",
                dump_response(version, status, &headers, &body)
            );
        }
        debug!(%status, bytes = body.len(), path, "received marketplace response");

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }

    fn build_url(&self, path: &str, query: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid path `{path}`: {err}")))?;
        url.set_query(Some(query));
        Ok(url)
    }

    fn base_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT_HEADER, self.user_agent.clone());
        headers
    }

    fn encode(&self, form: &FormBody, auth: bool) -> Result<String> {
        if !auth {
            return Ok(form.encode());
        }
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            Error::MissingCredentials("no API key and token configured".to_string())
        })?;
        Ok(form.encode_authenticated(credentials))
    }
}

fn normalize_response(response: &RawResponse) -> Result<Vec<u8>> {
    normalize(
        &response.body,
        response.status,
        response.content_type.as_deref(),
    )
}

/// Render a request the way it goes on the wire.
#[must_use]
pub fn dump_request(request: &Request) -> String {
    let url = request.url();
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut out = format!("{} {target} {:?}\n", request.method(), request.version());
    if let Some(host) = url.host_str() {
        match url.port() {
            Some(port) => {
                let _ = writeln!(out, "Host: {host}:{port}");
            }
            None => {
                let _ = writeln!(out, "Host: {host}");
            }
        }
    }
    write_headers(&mut out, request.headers());
    out.push('\n');
    if let Some(bytes) = request.body().and_then(reqwest::Body::as_bytes) {
        out.push_str(&String::from_utf8_lossy(bytes));
    }
    out
}

/// Render a response status line, headers and body.
#[must_use]
pub fn dump_response(version: Version, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> String {
    let mut out = format!("{version:?} {status}\n");
    write_headers(&mut out, headers);
    out.push('\n');
    out.push_str(&String::from_utf8_lossy(body));
    out
}

fn write_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let _ = writeln!(out, "{name}: {}", String::from_utf8_lossy(value.as_bytes()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Envelope, Reply};
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> ServiceClient {
        ServiceClientBuilder::new(server.uri())
            .unwrap()
            .with_credentials(Credentials::new("key", "token"))
            .build()
            .unwrap()
    }

    fn envelope(bytes: &[u8]) -> Envelope {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = ServiceClientBuilder::new("https://marketplace.example.com/api/v0/client")
            .unwrap()
            .build()
            .unwrap();
        let url = client.build_url("deploy/hostnodes", "").unwrap();
        assert_eq!(
            url.as_str(),
            "https://marketplace.example.com/api/v0/client/deploy/hostnodes?"
        );
    }

    #[test]
    fn query_is_attached_verbatim() {
        let client = ServiceClientBuilder::new("https://example.com/api/")
            .unwrap()
            .build()
            .unwrap();
        let url = client.build_url("start/single", "server=a%20b").unwrap();
        assert_eq!(url.query(), Some("server=a%20b"));
    }

    #[test]
    fn from_config_picks_up_credentials_and_debug() {
        let config = MarketplaceConfig::default()
            .with_credentials("k", "t")
            .with_debug(true);
        let client = ServiceClientBuilder::from_config(&config)
            .unwrap()
            .build()
            .unwrap();
        assert!(client.has_credentials());
        assert!(client.wire_dump);
        assert_eq!(
            client.base_url().as_str(),
            "https://marketplace.tensordock.com/api/v0/client/"
        );
    }

    #[test]
    fn invalid_user_agent_is_config_error() {
        let err = ServiceClientBuilder::new("https://example.com")
            .unwrap()
            .with_user_agent("bad\nagent")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[tokio::test]
    async fn get_sends_query_with_credentials_last() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start/single"))
            .and(query_param("server", "abc"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let mut params = FormBody::new();
        params.push("server", "abc");
        let bytes = test_client(&server)
            .get("start/single", &params, true)
            .await
            .unwrap();
        assert!(envelope(&bytes).success);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            requests[0].url.query(),
            Some("server=abc&api_key=key&api_token=token")
        );
    }

    #[tokio::test]
    async fn post_sends_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/get/single"))
            .and(header("content-type", FORM_CONTENT_TYPE))
            .and(body_string("server=abc&api_key=key&api_token=token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": "true",
                "virtualmachines": {}
            })))
            .mount(&server)
            .await;

        let mut body = FormBody::new();
        body.push("server", "abc");
        let bytes = test_client(&server)
            .post("get/single", &body, true)
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"success": true, "virtualmachines": {}}));
    }

    #[tokio::test]
    async fn html_error_page_is_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/list"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>oops</body></html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let bytes = test_client(&server)
            .post("list", &FormBody::new(), true)
            .await
            .unwrap();
        assert_eq!(envelope(&bytes), Envelope::failure("api call failed"));
    }

    #[tokio::test]
    async fn garbage_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/billing"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .get("billing", &FormBody::new(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn missing_success_on_error_status_reads_as_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/billing"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"balance": 1.0})))
            .mount(&server)
            .await;

        let bytes = test_client(&server)
            .get("billing", &FormBody::new(), true)
            .await
            .unwrap();
        let reply = Reply::<serde_json::Value>::decode(&bytes).unwrap();
        assert!(!reply.is_success());
    }

    #[tokio::test]
    async fn authenticated_call_without_credentials_fails_early() {
        let server = MockServer::start().await;
        let client = ServiceClientBuilder::new(server.uri())
            .unwrap()
            .build()
            .unwrap();

        let err = client
            .get("billing", &FormBody::new(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredentials(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unauthenticated_call_sends_no_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/deploy/hostnodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let client = ServiceClientBuilder::new(server.uri())
            .unwrap()
            .build()
            .unwrap();
        client
            .get("deploy/hostnodes", &FormBody::new(), false)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let query = requests[0].url.query().unwrap_or_default();
        assert!(!query.contains("api_key"));
    }

    #[tokio::test]
    async fn wire_dump_does_not_alter_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deploy/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "status": "Running"
            })))
            .mount(&server)
            .await;

        let client = ServiceClientBuilder::new(server.uri())
            .unwrap()
            .with_credentials(Credentials::new("key", "token"))
            .with_wire_dump(true)
            .build()
            .unwrap();
        let mut body = FormBody::new();
        body.push("server", "abc");
        let bytes = client.post("deploy/status", &body, true).await.unwrap();

        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["status"], json!("Running"));
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let client = ServiceClientBuilder::new("http://127.0.0.1:1")
            .unwrap()
            .with_credentials(Credentials::new("key", "token"))
            .build()
            .unwrap();

        let err = client
            .get("billing", &FormBody::new(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn dump_request_shows_line_headers_and_body() {
        let client = reqwest::Client::new();
        let request = client
            .post("http://example.com:8080/api/list?")
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body("api_key=k&api_token=t")
            .build()
            .unwrap();

        let dump = dump_request(&request);
        assert!(dump.starts_with("POST /api/list? HTTP/1.1\n"));
        assert!(dump.contains("Host: example.com:8080\n"));
        assert!(dump.contains("content-type: application/x-www-form-urlencoded\n"));
        assert!(dump.ends_with("\n\napi_key=k&api_token=t"));
    }

    #[test]
    fn dump_response_shows_status_and_body() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let dump = dump_response(
            Version::HTTP_11,
            StatusCode::OK,
            &headers,
            br#"{"success":true}"#,
        );
        assert_eq!(
            dump,
            "HTTP/1.1 200 OK\ncontent-type: application/json\n\n{\"success\":true}"
        );
    }
}
