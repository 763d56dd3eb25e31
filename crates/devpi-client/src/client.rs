//! The devpi client session and its request core.
//!
//! A `Client` owns a [`Transport`] and the current credentials. Resource
//! operations are grouped into sub-clients borrowed from it:
//!
//! ```no_run
//! use devpi_client::Client;
//!
//! # fn main() -> devpi_client::Result<()> {
//! let client = Client::builder("http://localhost:3141")
//!     .credentials("admin", "secret")
//!     .build()?;
//! let users = client.user().list()?;
//! client.user().create("newuser", "password123", None)?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::api::{Auth, IndexApi, ProjectApi, TokenApi, UserApi};
use crate::error::{DevpiError, Result};
use crate::transport::{
    Body, Credentials, HttpTransport, Method, Request, Response, TlsVerify, Transport,
};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for constructing a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Server root, e.g. `http://localhost:3141`.
    pub base_url: String,
    /// Username for password authentication.
    pub user: Option<String>,
    /// Password for password authentication.
    pub password: Option<String>,
    /// API token; takes precedence over user/password.
    pub token: Option<String>,
    /// Certificate verification policy.
    pub verify: TlsVerify,
    /// Per-request timeout. `None` disables the timeout.
    pub timeout: Option<Duration>,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        ClientOptions {
            base_url: base_url.into(),
            user: None,
            password: None,
            token: None,
            verify: TlsVerify::Enabled,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

/// Fluent builder over [`ClientOptions`].
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    options: ClientOptions,
}

impl ClientBuilder {
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.options.user = Some(user.into());
        self.options.password = Some(password.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.options.token = Some(token.into());
        self
    }

    pub fn verify(mut self, verify: TlsVerify) -> Self {
        self.options.verify = verify;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn build(self) -> Result<Client> {
        Client::new(self.options)
    }
}

/// A session against one devpi server.
pub struct Client {
    base_url: String,
    transport: Box<dyn Transport>,
    credentials: Option<Credentials>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            options: ClientOptions::new(base_url),
        }
    }

    /// Connect with a reqwest transport built from `options`.
    pub fn new(options: ClientOptions) -> Result<Self> {
        if matches!(options.timeout, Some(t) if t.is_zero()) {
            return Err(DevpiError::validation(
                "timeout must be greater than 0 seconds",
            ));
        }
        let base_url = normalize_base_url(&options.base_url)?;
        let credentials = resolve_credentials(&options)?;
        let transport = HttpTransport::new(options.timeout, &options.verify)?;

        let client = Client {
            base_url,
            transport: Box::new(transport),
            credentials,
        };
        info!(base_url = %client.base_url, "initialized devpi client");
        Ok(client)
    }

    /// Build a client over an arbitrary transport, unauthenticated.
    pub fn with_transport(base_url: &str, transport: Box<dyn Transport>) -> Result<Self> {
        Ok(Client {
            base_url: normalize_base_url(base_url)?,
            transport,
            credentials: None,
        })
    }

    /// Server root without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&mut self) -> Auth<'_> {
        Auth::new(self)
    }

    pub fn user(&self) -> UserApi<'_> {
        UserApi::new(self)
    }

    pub fn index(&self) -> IndexApi<'_> {
        IndexApi::new(self)
    }

    pub fn project(&self) -> ProjectApi<'_> {
        ProjectApi::new(self)
    }

    /// Alias of [`Client::project`].
    pub fn package(&self) -> ProjectApi<'_> {
        self.project()
    }

    pub fn token(&self) -> TokenApi<'_> {
        TokenApi::new(self)
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub(crate) fn set_credentials(&mut self, credentials: Option<Credentials>) {
        self.credentials = credentials;
    }

    /// Fetch the server root document.
    pub fn server_info(&self) -> Result<Value> {
        debug!("retrieving server information");
        self.get_json("/", &[])
    }

    /// End the session, releasing pooled connections.
    pub fn close(self) {
        debug!(base_url = %self.base_url, "closed devpi client session");
    }

    /// Join a server-relative path onto the base URL, keeping any base path prefix.
    pub(crate) fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and map non-success statuses to errors.
    pub(crate) fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Body,
    ) -> Result<Response> {
        let request = Request {
            method,
            url: self.url_for(path),
            path: path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body,
        };

        let response = match self.transport.send(&request, self.credentials.as_ref()) {
            Ok(response) => response,
            Err(e) => {
                error!(%method, path, error = %e, "request failed");
                return Err(e);
            }
        };

        if !response.is_success() {
            // Existence checks expect 404; callers decide whether it is a failure.
            if response.status == 404 {
                debug!(%method, path, status = response.status, "resource not found");
            } else {
                error!(%method, path, status = response.status, body = %response.text(), "request failed");
            }
            return Err(DevpiError::from_status(
                response.status,
                path,
                response.json_or_none(),
            ));
        }

        debug!(%method, path, status = response.status, "request succeeded");
        Ok(response)
    }

    /// Send a request and decode the body as JSON.
    pub(crate) fn request_json(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Body,
    ) -> Result<Value> {
        let response = self.send(method, path, query, body)?;
        response.parse_json().map_err(|e| {
            DevpiError::parsing(format!("Failed to parse JSON response: {e}"), None)
        })
    }

    pub(crate) fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.request_json(Method::Get, path, query, Body::Empty)
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DevpiError::validation("base_url cannot be empty"));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(DevpiError::validation(
            "base_url must start with http:// or https://",
        ));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Token wins; otherwise both user and password must be present.
fn resolve_credentials(options: &ClientOptions) -> Result<Option<Credentials>> {
    if let Some(token) = options.token.as_deref().filter(|t| !t.trim().is_empty()) {
        return Ok(Some(Credentials::Token(token.trim().to_string())));
    }

    let user = options
        .user
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let password = options
        .password
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    match (user, password) {
        (Some(username), Some(password)) => Ok(Some(Credentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })),
        (None, None) if options.user.is_none() && options.password.is_none() => Ok(None),
        _ => Err(DevpiError::validation(
            "Both username and password must be provided for password authentication",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use serde_json::json;

    #[test]
    fn rejects_bad_base_urls() {
        for (url, expected) in [
            ("", "base_url cannot be empty"),
            ("   ", "base_url cannot be empty"),
            ("localhost:3141", "base_url must start with http:// or https://"),
            ("ftp://example.com", "base_url must start with http:// or https://"),
        ] {
            let err = Client::builder(url).build().unwrap_err();
            assert_eq!(err.message(), expected);
        }
    }

    #[test]
    fn strips_trailing_slash() {
        let client = Client::builder(" http://localhost:3141/ ").build().unwrap();
        assert_eq!(client.base_url(), "http://localhost:3141");
        assert!(!client.is_authenticated());
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = Client::builder("http://localhost")
            .timeout(Some(Duration::ZERO))
            .build()
            .unwrap_err();
        assert_eq!(err.message(), "timeout must be greater than 0 seconds");
    }

    #[test]
    fn token_takes_precedence() {
        let mut options = ClientOptions::new("http://localhost");
        options.user = Some("admin".into());
        options.password = Some("secret".into());
        options.token = Some("devpi-xyz".into());
        let creds = resolve_credentials(&options).unwrap().unwrap();
        assert_eq!(creds, Credentials::Token("devpi-xyz".into()));
    }

    #[test]
    fn password_auth_needs_both_parts() {
        let mut options = ClientOptions::new("http://localhost");
        options.user = Some("admin".into());
        let err = resolve_credentials(&options).unwrap_err();
        assert!(err.message().contains("Both username and password"));

        options.password = Some("   ".into());
        assert!(resolve_credentials(&options).is_err());

        let client = Client::builder("http://localhost")
            .credentials("admin", "secret")
            .build()
            .unwrap();
        assert!(client.is_authenticated());
    }

    #[test]
    fn url_construction_ignores_leading_slash() {
        let client = Client::builder("http://test.example.com").build().unwrap();
        assert_eq!(client.url_for("/test/path"), "http://test.example.com/test/path");
        assert_eq!(client.url_for("test/path"), "http://test.example.com/test/path");
        assert_eq!(client.url_for("/"), "http://test.example.com/");
    }

    #[test]
    fn url_construction_keeps_base_prefix() {
        let client = Client::builder("https://pkgs.example.com/devpi/").build().unwrap();
        assert_eq!(client.url_for("/root/pypi"), "https://pkgs.example.com/devpi/root/pypi");
    }

    #[test]
    fn request_success_json() {
        let (client, log) = MockTransport::client(vec![Response::json(200, &json!({"result": "success"}))]);
        let value = client.get_json("/test", &[]).unwrap();
        assert_eq!(value, json!({"result": "success"}));

        let requests = log.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[0].url, "http://test.example.com/test");
    }

    #[test]
    fn request_raw_skips_json_parsing() {
        let (client, _) = MockTransport::client(vec![Response::new(200, "not json")]);
        let response = client.send(Method::Post, "/test", &[], Body::Empty).unwrap();
        assert_eq!(response.text(), "not json");
    }

    #[test]
    fn request_error_statuses() {
        let body = json!({"error": "Unauthorized"});
        let (client, _) = MockTransport::client(vec![Response::json(401, &body)]);
        let err = client.get_json("/test", &[]).unwrap_err();
        assert!(matches!(err, DevpiError::Authentication { .. }));
        assert!(err.message().contains("Authentication failed"));
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(err.response_data(), Some(&body));

        let (client, _) = MockTransport::client(vec![Response::json(404, &json!({"error": "Not found"}))]);
        let err = client.get_json("/test", &[]).unwrap_err();
        assert!(err.message().contains("Resource not found at /test"));

        let (client, _) = MockTransport::client(vec![Response::new(500, "")]);
        let err = client.get_json("/test", &[]).unwrap_err();
        assert_eq!(err.message(), "Server error (HTTP 500)");
        assert!(err.response_data().is_none());
    }

    #[test]
    fn request_json_parsing_error() {
        let (client, _) = MockTransport::client(vec![Response::new(200, "{invalid")]);
        let err = client.get_json("/test", &[]).unwrap_err();
        assert!(matches!(err, DevpiError::ResponseParsing { .. }));
        assert!(err.message().starts_with("Failed to parse JSON response"));
    }

    #[test]
    fn transport_errors_propagate() {
        let (client, _) = MockTransport::client(vec![]);
        let err = client.get_json("/test", &[]).unwrap_err();
        assert!(matches!(err, DevpiError::Network { .. }));
    }

    #[test]
    fn query_and_credentials_are_forwarded() {
        let (mut client, log) = MockTransport::client(vec![Response::json(200, &json!({}))]);
        client.auth().token("devpi-abc").unwrap();
        client.get_json("/root/dev", &[("no_projects", "")]).unwrap();

        let requests = log.requests();
        assert_eq!(requests[0].query, vec![("no_projects".to_string(), String::new())]);
        assert_eq!(
            log.credentials()[0],
            Some(Credentials::Token("devpi-abc".into()))
        );
    }

    #[test]
    fn server_info_reads_root() {
        let (client, log) = MockTransport::client(vec![Response::json(200, &json!({"type": "list:userconfig"}))]);
        let info = client.server_info().unwrap();
        assert_eq!(info["type"], "list:userconfig");
        assert_eq!(log.requests()[0].path, "/");
        client.close();
    }
}
