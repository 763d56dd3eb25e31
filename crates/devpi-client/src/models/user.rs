//! User models and the normalisation of devpi's user listings.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::index::IndexConfig;
use super::null_as_default;
use crate::error::{DevpiError, Result};

/// A devpi user and the indexes they own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub indexes: BTreeMap<String, IndexConfig>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<DateTime<Utc>>,
}

impl UserInfo {
    pub fn new(username: impl Into<String>) -> Self {
        UserInfo {
            username: username.into(),
            email: String::new(),
            indexes: BTreeMap::new(),
            created: None,
        }
    }

    /// Decode a user object, using `fallback` when the server omits the name.
    pub fn from_object(mut object: Map<String, Value>, fallback: &str) -> Result<Self> {
        if !matches!(object.get("username"), Some(Value::String(_))) {
            object.insert("username".into(), Value::String(fallback.to_string()));
        }
        let raw = Value::Object(object);
        let mut info: UserInfo = serde_json::from_value(raw.clone()).map_err(|e| {
            DevpiError::parsing(format!("invalid user payload for {fallback}: {e}"), Some(raw))
        })?;
        info.annotate_indexes();
        Ok(info)
    }

    /// Stamp each owned index with this user and its key.
    fn annotate_indexes(&mut self) {
        for (name, config) in self.indexes.iter_mut() {
            config.user.get_or_insert_with(|| self.username.clone());
            config.name.get_or_insert_with(|| name.clone());
        }
    }

    pub fn index_names(&self) -> Vec<&str> {
        self.indexes.keys().map(String::as_str).collect()
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    pub fn index_config(&self, name: &str) -> Option<&IndexConfig> {
        self.indexes.get(name)
    }
}

/// Unparseable timestamps are dropped rather than failing the whole user.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Some(Value::Number(n)) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    })
}

/// Usernames mapped to their details, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UserList(BTreeMap<String, UserInfo>);

impl UserList {
    /// Normalise any of the listing shapes devpi (and its proxies) return.
    ///
    /// Accepted: `{"result": {"users": {..}}}`, `{"result": {..}}`,
    /// `{"users": {..}}`, a bare mapping, or a list of usernames. A mapping
    /// entry that is not an object becomes a user whose email is the entry
    /// rendered as text.
    pub fn from_value(value: Value) -> Result<Self> {
        let payload = match value {
            Value::Object(mut map) if map.contains_key("result") => {
                match map.remove("result").unwrap_or(Value::Null) {
                    Value::Object(mut result) if result.contains_key("users") => {
                        result.remove("users").unwrap_or(Value::Null)
                    }
                    other => other,
                }
            }
            Value::Object(mut map) if map.contains_key("users") => {
                map.remove("users").unwrap_or(Value::Null)
            }
            other => other,
        };

        let mut users = BTreeMap::new();
        match payload {
            Value::Null => {}
            Value::Array(names) => {
                for name in names {
                    let name = match name {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    users.insert(name.clone(), UserInfo::new(name));
                }
            }
            Value::Object(entries) => {
                for (name, raw) in entries {
                    let info = match raw {
                        Value::Object(object) => UserInfo::from_object(object, &name)?,
                        Value::Null => UserInfo::new(name.as_str()),
                        Value::String(email) => UserInfo {
                            email,
                            ..UserInfo::new(name.as_str())
                        },
                        other => UserInfo {
                            email: other.to_string(),
                            ..UserInfo::new(name.as_str())
                        },
                    };
                    users.insert(name, info);
                }
            }
            other => {
                return Err(DevpiError::parsing(
                    "Unexpected response format when listing users",
                    Some(other),
                ))
            }
        }
        Ok(UserList(users))
    }

    pub fn usernames(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn get(&self, username: &str) -> Option<&UserInfo> {
        self.0.get(username)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.0.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &UserInfo)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, UserInfo> {
        self.0
    }
}

/// Fields to change on an existing user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserUpdate {
    pub fn password(password: impl Into<String>) -> Self {
        UserUpdate {
            password: Some(password.into()),
            ..Default::default()
        }
    }

    pub fn email(email: impl Into<String>) -> Self {
        UserUpdate {
            email: Some(email.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.email.is_none()
    }
}
