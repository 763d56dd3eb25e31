//! Token metadata derived from macaroon restrictions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DevpiError, Result};

/// A token as listed by the server or inspected locally.
///
/// The flattened fields are derived from `key=value` restrictions; anything
/// else stays only in `restrictions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    /// Unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
    #[serde(default)]
    pub restrictions: Vec<String>,
}

impl TokenInfo {
    pub fn from_restrictions(
        id: impl Into<String>,
        user: impl Into<String>,
        restrictions: Vec<String>,
    ) -> Result<Self> {
        let mut info = TokenInfo {
            id: id.into(),
            user: user.into(),
            allowed: None,
            expires: None,
            indexes: None,
            projects: None,
            restrictions: Vec::new(),
        };

        for item in &restrictions {
            let Some((key, value)) = item.split_once('=') else {
                continue;
            };
            let list = || value.split(',').map(str::to_string).collect::<Vec<_>>();
            match key {
                "expires" => {
                    let ts = value.trim().parse::<i64>().map_err(|_| {
                        DevpiError::parsing(format!("invalid expires restriction '{item}'"), None)
                    })?;
                    info.expires = Some(ts);
                }
                "allowed" => info.allowed = Some(list()),
                "indexes" => info.indexes = Some(list()),
                "projects" => info.projects = Some(list()),
                _ => {}
            }
        }
        info.restrictions = restrictions;
        Ok(info)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// Tokens without an expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|ts| ts <= now.timestamp())
    }
}

#[derive(Deserialize)]
struct RawToken {
    #[serde(default)]
    restrictions: Vec<String>,
}

/// Decode `GET /<user>/+tokens`, keyed by token id.
pub fn tokens_from_value(value: Value, user: &str) -> Result<BTreeMap<String, TokenInfo>> {
    let tokens = match value {
        Value::Object(mut map) if map.contains_key("result") => match map.remove("result") {
            Some(Value::Object(mut result)) => result.remove("tokens").unwrap_or(Value::Null),
            _ => Value::Null,
        },
        Value::Object(mut map) if map.contains_key("tokens") => {
            map.remove("tokens").unwrap_or(Value::Null)
        }
        other => other,
    };

    let entries = match tokens {
        Value::Null => return Ok(BTreeMap::new()),
        Value::Object(entries) => entries,
        other => {
            return Err(DevpiError::parsing(
                "Unexpected response format when listing tokens",
                Some(other),
            ))
        }
    };

    entries
        .into_iter()
        .map(|(id, raw)| {
            let parsed: RawToken = serde_json::from_value(raw.clone()).map_err(|e| {
                DevpiError::parsing(format!("invalid token entry {id}: {e}"), Some(raw))
            })?;
            let info = TokenInfo::from_restrictions(id.as_str(), user, parsed.restrictions)?;
            Ok((id, info))
        })
        .collect()
}

/// What to ask for when creating a token. Empty lists mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenRequest {
    pub allowed: Vec<String>,
    pub expires_in_seconds: Option<u64>,
    pub indexes: Vec<String>,
    pub projects: Vec<String>,
}

impl TokenRequest {
    pub fn allowed<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn expires_in(mut self, seconds: u64) -> Self {
        self.expires_in_seconds = Some(seconds);
        self
    }

    pub fn indexes<I, S>(mut self, indexes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes = indexes.into_iter().map(Into::into).collect();
        self
    }

    pub fn projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projects = projects.into_iter().map(Into::into).collect();
        self
    }
}
