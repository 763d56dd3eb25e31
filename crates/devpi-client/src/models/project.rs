//! Release metadata as served under `/<user>/<index>/<project>`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{null_as_default, unwrap_result};
use crate::error::{DevpiError, Result};

/// One entry of a release file's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogItem {
    pub what: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub who: Option<String>,
    /// Broken-down UTC time: year, month, day, hour, minute, second.
    #[serde(default, deserialize_with = "null_as_default")]
    pub when: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
}

/// A release file or doc zip attached to a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    #[serde(default)]
    pub hash_spec: String,
    pub href: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub log: Vec<LogItem>,
}

impl Link {
    /// Last path segment of `href`.
    pub fn file_name(&self) -> &str {
        let path = self.href.split(['#', '?']).next().unwrap_or(&self.href);
        path.rsplit('/').next().unwrap_or(path)
    }
}

/// Core metadata of one version of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectVersion {
    pub name: String,
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub home_page: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub license: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub requires_python: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub requires_dist: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub classifiers: Vec<String>,
    #[serde(rename = "+links", default, deserialize_with = "null_as_default")]
    pub links: Vec<Link>,
    /// Every other core-metadata field devpi stores verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProjectVersion {
    /// Release files, skipping documentation and toxresult links.
    pub fn release_files(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(|l| l.rel == "releasefile")
    }
}

/// Decode the version mapping of a project document.
pub fn versions_from_value(value: Value) -> Result<BTreeMap<String, ProjectVersion>> {
    match unwrap_result(value) {
        Value::Null => Ok(BTreeMap::new()),
        inner @ Value::Object(_) => serde_json::from_value(inner.clone()).map_err(|e| {
            DevpiError::parsing(format!("invalid project payload: {e}"), Some(inner))
        }),
        other => Err(DevpiError::parsing(
            "project payload is not a mapping",
            Some(other),
        )),
    }
}
