use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::json_body;
use crate::client::Client;
use crate::error::{DevpiError, Result};
use crate::models::index::index_map_from_value;
use crate::models::{DeleteResponse, IndexConfig, IndexSpec, IndexUpdate};
use crate::transport::{Body, Method};
use crate::validate::non_empty;

/// Index management, `client.index()`.
pub struct IndexApi<'a> {
    client: &'a Client,
}

impl<'a> IndexApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        IndexApi { client }
    }

    /// Create `user/name` and return its configuration as stored.
    pub fn create(&self, user: &str, name: &str, spec: &IndexSpec) -> Result<IndexConfig> {
        let path = index_path(user, name)?;
        info!(index = %path, index_type = %spec.index_type, "creating index");
        self.client.send(Method::Put, &path, &[], json_body(spec)?)?;
        self.get(user, name, false)
    }

    /// Fetch an index. The project list is skipped unless `with_projects`.
    pub fn get(&self, user: &str, name: &str, with_projects: bool) -> Result<IndexConfig> {
        let path = index_path(user, name)?;
        debug!(index = %path, with_projects, "retrieving index");
        let query: &[(&str, &str)] = if with_projects {
            &[]
        } else {
            &[("no_projects", "")]
        };
        let response = self.client.get_json(&path, query)?;
        IndexConfig::from_value(response, user, name)
    }

    /// Patch the populated fields of `update`, then re-read the index.
    pub fn modify(&self, user: &str, name: &str, update: &IndexUpdate) -> Result<IndexConfig> {
        let path = index_path(user, name)?;
        if update.is_empty() {
            warn!(index = %path, "modify called without any attributes");
            return Err(DevpiError::validation("No attributes provided to modify"));
        }
        info!(index = %path, "modifying index");
        self.client.send(Method::Patch, &path, &[], json_body(update)?)?;
        self.get(user, name, false)
    }

    pub fn delete(&self, user: &str, name: &str) -> Result<DeleteResponse> {
        let path = index_path(user, name)?;
        info!(index = %path, "deleting index");
        let response = self
            .client
            .request_json(Method::Delete, &path, &[], Body::Empty)?;
        DeleteResponse::from_value(response)
    }

    /// Indexes owned by `user`, keyed by index name.
    pub fn list(&self, user: &str) -> Result<BTreeMap<String, IndexConfig>> {
        non_empty("user", user)?;
        debug!(user, "listing indexes");
        let response = self.client.get_json(&format!("/{user}"), &[])?;
        index_map_from_value(response, user)
    }
}

fn index_path(user: &str, name: &str) -> Result<String> {
    non_empty("user", user)?;
    non_empty("name", name)?;
    Ok(format!("/{user}/{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use crate::transport::Response;
    use serde_json::json;

    fn index_doc() -> serde_json::Value {
        json!({
            "type": "indexconfig",
            "result": {"type": "stage", "bases": ["root/pypi"], "volatile": true, "acl_upload": ["alice"]}
        })
    }

    #[test]
    fn create_puts_then_gets() {
        let (client, log) = MockTransport::client(vec![
            Response::json(200, &json!({})),
            Response::json(200, &index_doc()),
        ]);
        let spec = IndexSpec::default().bases(["root/pypi"]);
        let config = client.index().create("alice", "dev", &spec).unwrap();
        assert_eq!(config.full_name().as_deref(), Some("alice/dev"));

        let requests = log.requests();
        assert_eq!(requests[0].method, Method::Put);
        assert_eq!(requests[0].path, "/alice/dev");
        assert_eq!(
            requests[0].body,
            Body::Json(json!({"type": "stage", "volatile": true, "bases": ["root/pypi"]}))
        );
        assert_eq!(requests[1].query, vec![("no_projects".to_string(), String::new())]);
    }

    #[test]
    fn create_mirror_payload() {
        let (client, log) = MockTransport::client(vec![
            Response::json(200, &json!({})),
            Response::json(200, &json!({"result": {"type": "mirror", "mirror_url": "https://pypi.org/simple/"}})),
        ]);
        let config = client
            .index()
            .create("root", "pypi", &IndexSpec::mirror("https://pypi.org/simple/"))
            .unwrap();
        assert!(config.is_mirror());
        assert_eq!(
            log.requests()[0].body,
            Body::Json(json!({"type": "mirror", "volatile": false, "mirror_url": "https://pypi.org/simple/"}))
        );
    }

    #[test]
    fn get_with_projects_has_no_query() {
        let (client, log) = MockTransport::client(vec![Response::json(
            200,
            &json!({"result": {"type": "stage", "projects": ["demo"]}}),
        )]);
        let config = client.index().get("alice", "dev", true).unwrap();
        assert_eq!(config.projects, Some(vec!["demo".to_string()]));
        assert!(log.requests()[0].query.is_empty());
    }

    #[test]
    fn get_validates_names() {
        let (client, _) = MockTransport::client(vec![]);
        assert_eq!(
            client.index().get("alice", " ", false).unwrap_err().message(),
            "Parameter 'name' must be a non-empty string"
        );
        assert_eq!(
            client.index().list("").unwrap_err().message(),
            "Parameter 'user' must be a non-empty string"
        );
    }

    #[test]
    fn get_not_found() {
        let (client, _) = MockTransport::client(vec![Response::json(404, &json!({"message": "no such index"}))]);
        let err = client.index().get("alice", "nope", false).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.message(), "Resource not found at /alice/nope: no such index");
    }

    #[test]
    fn modify_sends_only_set_fields() {
        let (client, log) = MockTransport::client(vec![
            Response::json(200, &json!({})),
            Response::json(200, &index_doc()),
        ]);
        let update = IndexUpdate {
            acl_upload: Some(vec!["alice".into(), "bob".into()]),
            ..Default::default()
        };
        client.index().modify("alice", "dev", &update).unwrap();
        let requests = log.requests();
        assert_eq!(requests[0].method, Method::Patch);
        assert_eq!(requests[0].body, Body::Json(json!({"acl_upload": ["alice", "bob"]})));
    }

    #[test]
    fn modify_requires_changes() {
        let (client, log) = MockTransport::client(vec![]);
        let err = client
            .index()
            .modify("alice", "dev", &IndexUpdate::default())
            .unwrap_err();
        assert_eq!(err.message(), "No attributes provided to modify");
        assert!(log.requests().is_empty());
    }

    #[test]
    fn delete_index() {
        let (client, log) = MockTransport::client(vec![Response::new(200, "")]);
        let resp = client.index().delete("alice", "dev").unwrap();
        assert_eq!(resp, DeleteResponse::default());
        assert_eq!(log.requests()[0].method, Method::Delete);
    }

    #[test]
    fn list_indexes() {
        let (client, log) = MockTransport::client(vec![Response::json(
            200,
            &json!({"result": {"username": "alice", "indexes": {
                "dev": {"type": "stage"},
                "prod": {"type": "stage", "volatile": false}
            }}}),
        )]);
        let indexes = client.index().list("alice").unwrap();
        assert_eq!(indexes.keys().collect::<Vec<_>>(), vec!["dev", "prod"]);
        assert_eq!(indexes["prod"].user.as_deref(), Some("alice"));
        assert_eq!(log.requests()[0].path, "/alice");
    }

    #[test]
    fn list_empty() {
        let (client, _) = MockTransport::client(vec![Response::json(200, &json!({}))]);
        assert!(client.index().list("newuser").unwrap().is_empty());
    }
}
