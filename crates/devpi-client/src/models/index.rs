//! Index configuration models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{null_as_default, unwrap_result};
use crate::error::{DevpiError, Result};

/// Configuration of a single index as reported by the server.
///
/// `user` and `name` are not part of devpi's payload; they are filled in from
/// the request path or the enclosing mapping key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub index_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bases: Vec<String>,
    #[serde(default)]
    pub volatile: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub acl_upload: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub acl_toxresult_upload: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_whitelist_inheritance: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mirror_whitelist: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Project names; only present when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
    /// Plugin-defined and otherwise unmodelled keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl IndexConfig {
    /// A bare config of the given type, mostly useful in tests.
    pub fn new(index_type: impl Into<String>) -> Self {
        IndexConfig {
            user: None,
            name: None,
            index_type: index_type.into(),
            bases: Vec::new(),
            volatile: false,
            acl_upload: Vec::new(),
            acl_toxresult_upload: Vec::new(),
            mirror_whitelist_inheritance: None,
            mirror_whitelist: Vec::new(),
            mirror_url: None,
            title: None,
            projects: None,
            extra: BTreeMap::new(),
        }
    }

    /// Decode a (possibly wrapped) index payload and stamp its location.
    pub fn from_value(value: Value, user: &str, name: &str) -> Result<Self> {
        let inner = unwrap_result(value);
        let mut config: IndexConfig = serde_json::from_value(inner.clone()).map_err(|e| {
            DevpiError::parsing(format!("invalid index configuration: {e}"), Some(inner))
        })?;
        config.user = Some(user.to_string());
        config.name = Some(name.to_string());
        Ok(config)
    }

    /// `user/name`, when both are known.
    pub fn full_name(&self) -> Option<String> {
        match (&self.user, &self.name) {
            (Some(user), Some(name)) => Some(format!("{user}/{name}")),
            _ => None,
        }
    }

    pub fn is_mirror(&self) -> bool {
        self.index_type == "mirror"
    }
}

/// Decode a user's index mapping, naming each entry after its key.
///
/// Accepts `{"result": {"indexes": {...}}}` as returned by `GET /<user>`, or
/// the bare mapping.
pub fn index_map_from_value(value: Value, user: &str) -> Result<BTreeMap<String, IndexConfig>> {
    let indexes = match value {
        Value::Object(mut map) if map.contains_key("result") => match map.remove("result") {
            Some(Value::Object(mut result)) => result.remove("indexes").unwrap_or(Value::Null),
            _ => Value::Null,
        },
        other => other,
    };

    let entries = match indexes {
        Value::Null => return Ok(BTreeMap::new()),
        Value::Object(entries) => entries,
        other => {
            return Err(DevpiError::parsing(
                "index listing is not a mapping",
                Some(other),
            ))
        }
    };

    entries
        .into_iter()
        .map(|(name, raw)| {
            let mut config: IndexConfig = serde_json::from_value(raw.clone()).map_err(|e| {
                DevpiError::parsing(format!("invalid configuration for index {name}: {e}"), Some(raw))
            })?;
            config.user.get_or_insert_with(|| user.to_string());
            config.name.get_or_insert_with(|| name.clone());
            Ok((name, config))
        })
        .collect()
}

/// Parameters for creating an index. Defaults to a volatile stage index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSpec {
    #[serde(rename = "type")]
    pub index_type: String,
    pub volatile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bases: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl_upload: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl_toxresult_upload: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_whitelist_inheritance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_whitelist: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Default for IndexSpec {
    fn default() -> Self {
        IndexSpec {
            index_type: "stage".to_string(),
            volatile: true,
            bases: None,
            acl_upload: None,
            acl_toxresult_upload: None,
            mirror_whitelist_inheritance: None,
            mirror_whitelist: None,
            mirror_url: None,
            title: None,
        }
    }
}

impl IndexSpec {
    /// A mirror of `url`, e.g. `https://pypi.org/simple/`.
    pub fn mirror(url: impl Into<String>) -> Self {
        IndexSpec {
            index_type: "mirror".to_string(),
            volatile: false,
            mirror_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn bases<I, S>(mut self, bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bases = Some(bases.into_iter().map(Into::into).collect());
        self
    }

    pub fn volatile(mut self, volatile: bool) -> Self {
        self.volatile = volatile;
        self
    }

    pub fn acl_upload<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acl_upload = Some(users.into_iter().map(Into::into).collect());
        self
    }
}

/// A partial index update; only populated fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexUpdate {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub index_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bases: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl_upload: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl_toxresult_upload: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_whitelist_inheritance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_whitelist: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl IndexUpdate {
    pub fn is_empty(&self) -> bool {
        self == &IndexUpdate::default()
    }
}
