use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::client::Client;
use crate::error::{DevpiError, Result};
use crate::macaroon::Macaroon;
use crate::models::token::tokens_from_value;
use crate::models::{DeleteResponse, TokenInfo, TokenRequest};
use crate::transport::{Body, Method};
use crate::validate::non_empty;

/// Permissions a token may be restricted to.
pub const PUBLIC_PERMISSIONS: &[&str] = &[
    "del_entry",
    "del_project",
    "del_verdata",
    "index_create",
    "index_delete",
    "index_modify",
    "pkg_read",
    "toxresult_upload",
    "upload",
];

/// Accepted by the server but not advertised.
pub const HIDDEN_PERMISSIONS: &[&str] = &["user_create", "user_delete", "user_login", "user_modify"];

const TOKEN_PREFIX: &str = "devpi-";

/// Check permission names, returning them trimmed, sorted and de-duplicated.
pub fn validate_permissions<S: AsRef<str>>(permissions: &[S]) -> Result<Vec<String>> {
    let mut cleaned = Vec::with_capacity(permissions.len());
    for perm in permissions {
        let perm = perm.as_ref();
        if perm.trim().is_empty() {
            return Err(DevpiError::validation(format!(
                "Invalid permission '{perm}': must be a non-empty string"
            )));
        }
        cleaned.push(perm.trim());
    }

    let unknown: Vec<&str> = cleaned
        .iter()
        .copied()
        .filter(|p| !PUBLIC_PERMISSIONS.contains(p) && !HIDDEN_PERMISSIONS.contains(p))
        .collect();
    if !unknown.is_empty() {
        return Err(DevpiError::validation(format!(
            "Unknown permissions: {}. Valid permissions: {}",
            unknown.join(", "),
            PUBLIC_PERMISSIONS.join(", ")
        )));
    }

    Ok(cleaned
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect())
}

/// Decode a token locally, without contacting the server.
///
/// The optional `devpi-` prefix is stripped; the macaroon identifier is
/// `<user>-<token id>` and each caveat is one restriction.
pub fn inspect_token(token: &str) -> Result<TokenInfo> {
    let token = non_empty("token", token)?.trim();
    let encoded = token.strip_prefix(TOKEN_PREFIX).unwrap_or(token);

    let macaroon = Macaroon::deserialize(encoded)?;
    let identifier = macaroon.identifier_str()?;
    let (user, id) = identifier
        .rsplit_once('-')
        .filter(|(user, id)| !user.is_empty() && !id.is_empty())
        .ok_or_else(|| DevpiError::InvalidToken {
            detail: format!("Invalid token identifier format: {identifier}"),
        })?;

    let restrictions = macaroon
        .caveats
        .iter()
        .map(|c| c.id_str().into_owned())
        .collect();
    TokenInfo::from_restrictions(id, user, restrictions).map_err(|e| DevpiError::InvalidToken {
        detail: e.message(),
    })
}

/// Body of `POST /<user>/+token-create`, relative to `now`.
fn create_payload(request: &TokenRequest, now: DateTime<Utc>) -> Result<Value> {
    let allowed = validate_permissions(&request.allowed)?;
    let mut payload = Map::new();

    if !allowed.is_empty() {
        payload.insert("allowed".into(), json!(allowed));
    }
    if let Some(seconds) = request.expires_in_seconds {
        let seconds = i64::try_from(seconds)
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| DevpiError::validation("expires_in_seconds must be a positive integer"))?;
        payload.insert("expires".into(), json!(now.timestamp().saturating_add(seconds)));
    }
    if !request.indexes.is_empty() {
        payload.insert("indexes".into(), json!(request.indexes));
    }
    if !request.projects.is_empty() {
        payload.insert("projects".into(), json!(request.projects));
    }
    Ok(Value::Object(payload))
}

/// Token management via the devpi-tokens plugin, `client.token()`.
pub struct TokenApi<'a> {
    client: &'a Client,
}

impl<'a> TokenApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        TokenApi { client }
    }

    /// Create a token and return its secret.
    pub fn create(&self, username: &str, request: &TokenRequest) -> Result<String> {
        non_empty("username", username)?;
        let payload = create_payload(request, Utc::now())?;

        info!(username, "creating token");
        let response = self.client.request_json(
            Method::Post,
            &format!("/{username}/+token-create"),
            &[],
            Body::Json(payload),
        )?;

        match response.pointer("/result/token").and_then(Value::as_str) {
            Some(token) => Ok(token.to_string()),
            None => Err(DevpiError::parsing(
                "Unexpected response format when creating token",
                Some(response),
            )),
        }
    }

    /// Tokens of `user`, keyed by token id.
    pub fn list(&self, user: &str) -> Result<BTreeMap<String, TokenInfo>> {
        non_empty("user", user)?;
        debug!(user, "listing tokens");
        let response = self.client.get_json(&format!("/{user}/+tokens"), &[])?;
        tokens_from_value(response, user)
    }

    /// Revoke by id (not by secret).
    pub fn delete(&self, username: &str, token_id: &str) -> Result<DeleteResponse> {
        non_empty("username", username)?;
        non_empty("token_id", token_id)?;
        info!(username, token_id, "deleting token");
        let response = self.client.request_json(
            Method::Delete,
            &format!("/{username}/+tokens/{token_id}"),
            &[],
            Body::Empty,
        )?;
        DeleteResponse::from_value(response)
    }

    /// See [`inspect_token`].
    pub fn inspect(&self, token: &str) -> Result<TokenInfo> {
        inspect_token(token)
    }

    pub fn exists(&self, username: &str, token_id: &str) -> Result<bool> {
        non_empty("username", username)?;
        non_empty("token_id", token_id)?;
        match self.list(username) {
            Ok(tokens) => Ok(tokens.contains_key(token_id)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
