//! Client error types.

use std::path::PathBuf;

use serde_json::Value;

/// Errors that can occur while talking to a devpi server.
#[derive(Debug, thiserror::Error)]
pub enum DevpiError {
    /// Credentials were rejected (HTTP 401).
    #[error("{message}")]
    Authentication {
        message: String,
        status: Option<u16>,
        response: Option<Value>,
    },

    /// Invalid input, caught locally or rejected by the server (HTTP 400).
    #[error("{message}")]
    Validation {
        message: String,
        status: Option<u16>,
        response: Option<Value>,
    },

    /// The requested resource does not exist (HTTP 404).
    #[error("{message}")]
    NotFound {
        message: String,
        status: Option<u16>,
        response: Option<Value>,
    },

    /// Access was forbidden (HTTP 403).
    #[error("{message}")]
    Permission {
        message: String,
        status: Option<u16>,
        response: Option<Value>,
    },

    /// The resource already exists or is otherwise in conflict (HTTP 409).
    #[error("{message}")]
    Conflict {
        message: String,
        status: Option<u16>,
        response: Option<Value>,
    },

    /// The server failed (HTTP 5xx) or answered with an unexpected status.
    #[error("{message}")]
    Server {
        message: String,
        status: Option<u16>,
        response: Option<Value>,
    },

    /// The request never produced an HTTP response.
    #[error("{message}")]
    Network { message: String },

    /// The response body did not have the expected shape.
    #[error("{message}")]
    ResponseParsing {
        message: String,
        response: Option<Value>,
    },

    /// A local package file is missing.
    #[error("package file not found at: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// A package archive could not be read or lacks metadata.
    #[error("{detail}")]
    Package { detail: String },

    /// A token string could not be decoded.
    #[error("Failed to parse token: {detail}")]
    InvalidToken { detail: String },

    /// Configuration could not be loaded.
    #[error("configuration error: {detail}")]
    Config { detail: String },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DevpiError {
    /// Build a local validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        DevpiError::Validation {
            message: message.into(),
            status: None,
            response: None,
        }
    }

    /// Build a parsing error, keeping the offending payload.
    pub fn parsing(message: impl Into<String>, response: Option<Value>) -> Self {
        DevpiError::ResponseParsing {
            message: message.into(),
            response,
        }
    }

    /// Build an error for a non-success HTTP status.
    ///
    /// `path` is the request path, used in the not-found message. Any
    /// `message` or `error` text in the body is appended to the summary.
    pub fn from_status(status: u16, path: &str, response: Option<Value>) -> Self {
        let summary = match status {
            400 => "Bad request".to_string(),
            401 => "Authentication failed".to_string(),
            403 => "Access forbidden".to_string(),
            404 => format!("Resource not found at {path}"),
            409 => "Conflict".to_string(),
            500..=599 => format!("Server error (HTTP {status})"),
            _ => format!("HTTP error (HTTP {status})"),
        };
        let message = match response.as_ref().and_then(server_message) {
            Some(detail) => format!("{summary}: {detail}"),
            None => summary,
        };
        match status {
            400 => DevpiError::Validation {
                message,
                status: Some(status),
                response,
            },
            401 => DevpiError::Authentication {
                message,
                status: Some(status),
                response,
            },
            403 => DevpiError::Permission {
                message,
                status: Some(status),
                response,
            },
            404 => DevpiError::NotFound {
                message,
                status: Some(status),
                response,
            },
            409 => DevpiError::Conflict {
                message,
                status: Some(status),
                response,
            },
            _ => DevpiError::Server {
                message,
                status: Some(status),
                response,
            },
        }
    }

    /// Human-readable message without the variant decoration.
    pub fn message(&self) -> String {
        match self {
            DevpiError::Authentication { message, .. }
            | DevpiError::Validation { message, .. }
            | DevpiError::NotFound { message, .. }
            | DevpiError::Permission { message, .. }
            | DevpiError::Conflict { message, .. }
            | DevpiError::Server { message, .. }
            | DevpiError::Network { message }
            | DevpiError::ResponseParsing { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// HTTP status code, when the error came from a server response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DevpiError::Authentication { status, .. }
            | DevpiError::Validation { status, .. }
            | DevpiError::NotFound { status, .. }
            | DevpiError::Permission { status, .. }
            | DevpiError::Conflict { status, .. }
            | DevpiError::Server { status, .. } => *status,
            _ => None,
        }
    }

    /// Parsed response body attached to the error, if any.
    pub fn response_data(&self) -> Option<&Value> {
        match self {
            DevpiError::Authentication { response, .. }
            | DevpiError::Validation { response, .. }
            | DevpiError::NotFound { response, .. }
            | DevpiError::Permission { response, .. }
            | DevpiError::Conflict { response, .. }
            | DevpiError::Server { response, .. }
            | DevpiError::ResponseParsing { response, .. } => response.as_ref(),
            _ => None,
        }
    }

    /// True for a 404-style miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DevpiError::NotFound { .. })
    }
}

/// Extract devpi's free-text explanation from an error body.
fn server_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, DevpiError>;
