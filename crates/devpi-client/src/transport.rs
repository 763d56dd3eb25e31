//! HTTP transport abstraction and the reqwest-backed implementation.
//!
//! The `Transport` trait is the seam between request construction in
//! [`Client`](crate::Client) and the wire. `HttpTransport` talks to a real
//! server; tests substitute a scripted transport.

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;

use crate::error::{DevpiError, Result};
use crate::version;

/// HTTP verbs used by the devpi API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Patch,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file attached to a multipart upload.
#[derive(Clone, PartialEq)]
pub struct FilePart {
    /// Form field name.
    pub field: String,
    /// File name reported to the server.
    pub file_name: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for FilePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePart")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Multipart {
        fields: Vec<(String, String)>,
        file: FilePart,
    },
}

/// A fully resolved request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Path relative to the server root, kept for error messages.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
}

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Response {
            status,
            body: body.into(),
        }
    }

    /// Build a response carrying a JSON document.
    pub fn json(status: u16, value: &Value) -> Self {
        Response::new(status, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Parse the body as JSON. An empty body is `null`.
    pub fn parse_json(&self) -> std::result::Result<Value, serde_json::Error> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
    }

    /// Parse the body as JSON, swallowing failures.
    pub fn json_or_none(&self) -> Option<Value> {
        self.parse_json().ok().filter(|v| !v.is_null())
    }
}

/// Credentials attached to every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    /// devpi tokens are sent as basic auth with the fixed `__token__` user.
    Token(String),
}

pub const TOKEN_USERNAME: &str = "__token__";

impl Credentials {
    pub fn username(&self) -> &str {
        match self {
            Credentials::Basic { username, .. } => username,
            Credentials::Token(_) => TOKEN_USERNAME,
        }
    }

    pub fn secret(&self) -> &str {
        match self {
            Credentials::Basic { password, .. } => password,
            Credentials::Token(token) => token,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

/// TLS certificate verification policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerify {
    #[default]
    Enabled,
    Disabled,
    /// Trust the certificates in this PEM bundle in addition to the system roots.
    CaBundle(PathBuf),
}

/// Sends requests to a devpi server.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request, credentials: Option<&Credentials>) -> Result<Response>;
}

/// Blocking reqwest transport with devpi's default headers.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>, verify: &TlsVerify) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .user_agent(version::user_agent())
            .timeout(timeout);

        match verify {
            TlsVerify::Enabled => {}
            TlsVerify::Disabled => {
                tracing::warn!("TLS certificate verification is disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
            TlsVerify::CaBundle(path) => {
                let pem = std::fs::read(path).map_err(|e| DevpiError::Config {
                    detail: format!("cannot read CA bundle {}: {e}", path.display()),
                })?;
                let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                    DevpiError::Config {
                        detail: format!("invalid CA bundle {}: {e}", path.display()),
                    }
                })?;
                for cert in certs {
                    builder = builder.add_root_certificate(cert);
                }
            }
        }

        let http = builder.build().map_err(|e| DevpiError::Config {
            detail: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(HttpTransport { http })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request, credentials: Option<&Credentials>) -> Result<Response> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.http.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(credentials) = credentials {
            builder = builder.basic_auth(credentials.username(), Some(credentials.secret()));
        }
        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Multipart { fields, file } => {
                let mut form = reqwest::blocking::multipart::Form::new();
                for (name, value) in fields {
                    form = form.text(name.clone(), value.clone());
                }
                let part = reqwest::blocking::multipart::Part::bytes(file.bytes.clone())
                    .file_name(file.file_name.clone());
                builder.multipart(form.part(file.field.clone(), part))
            }
        };

        let response = builder
            .send()
            .map_err(|e| network_error(&request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| network_error(&request.url, e))?;
        Ok(Response::new(status, body.to_vec()))
    }
}

fn network_error(url: &str, err: reqwest::Error) -> DevpiError {
    let message = if err.is_connect() || err.is_timeout() {
        format!("Network error while connecting to {url}: {err}")
    } else {
        format!("Request failed: {err}")
    };
    DevpiError::Network { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_body_parses_as_null() {
        assert_eq!(Response::new(200, "").parse_json().unwrap(), Value::Null);
        assert_eq!(Response::new(200, " \n").parse_json().unwrap(), Value::Null);
        assert!(Response::new(200, "").json_or_none().is_none());
    }

    #[test]
    fn json_body_round_trips() {
        let value = json!({"result": "success"});
        let response = Response::json(200, &value);
        assert!(response.is_success());
        assert_eq!(response.parse_json().unwrap(), value);
    }

    #[test]
    fn invalid_json_is_reported() {
        let response = Response::new(200, "<html>");
        assert!(response.parse_json().is_err());
        assert!(response.json_or_none().is_none());
    }

    #[test]
    fn token_credentials_use_fixed_username() {
        let creds = Credentials::Token("devpi-abc".into());
        assert_eq!(creds.username(), "__token__");
        assert_eq!(creds.secret(), "devpi-abc");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = Credentials::Basic {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("admin"));
        assert!(!shown.contains("hunter2"));
        assert!(!format!("{:?}", Credentials::Token("s3cr3t".into())).contains("s3cr3t"));
    }

    #[test]
    fn missing_ca_bundle_is_a_config_error() {
        let err = HttpTransport::new(
            Some(Duration::from_secs(1)),
            &TlsVerify::CaBundle(PathBuf::from("/nonexistent/ca.pem")),
        )
        .unwrap_err();
        assert!(matches!(err, DevpiError::Config { .. }));
    }

    #[test]
    fn method_names() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }
}
