use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{debug, info};

use super::json_body;
use crate::client::Client;
use crate::error::{DevpiError, Result};
use crate::models::{DeleteResponse, UserInfo, UserList, UserUpdate};
use crate::transport::{Body, Method};
use crate::validate::non_empty;

/// User management, `client.user()`.
pub struct UserApi<'a> {
    client: &'a Client,
}

impl<'a> UserApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        UserApi { client }
    }

    /// Create a user; fails with `Conflict` if it already exists.
    pub fn create(&self, username: &str, password: &str, email: Option<&str>) -> Result<UserInfo> {
        non_empty("username", username)?;
        non_empty("password", password)?;

        let mut payload = json!({ "password": password });
        if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
            payload["email"] = Value::String(email.to_string());
        }

        info!(username, "creating user");
        let response = self.client.request_json(
            Method::Put,
            &format!("/{username}"),
            &[],
            Body::Json(payload),
        )?;

        match response {
            Value::Object(mut map) => match map.remove("result") {
                Some(Value::Object(result)) => UserInfo::from_object(result, username),
                _ => Err(DevpiError::parsing(
                    "User creation response missing result payload",
                    Some(Value::Object(map)),
                )),
            },
            other => Err(DevpiError::parsing(
                "User creation response missing result payload",
                Some(other),
            )),
        }
    }

    pub fn get(&self, username: &str) -> Result<UserInfo> {
        non_empty("username", username)?;
        debug!(username, "retrieving user");
        let response = self.client.get_json(&format!("/{username}"), &[])?;

        match response {
            Value::Object(mut map) => match map.remove("result") {
                Some(Value::Object(result)) => UserInfo::from_object(result, username),
                _ => Err(unexpected_user_format(username, Value::Object(map))),
            },
            other => Err(unexpected_user_format(username, other)),
        }
    }

    pub fn delete(&self, username: &str) -> Result<DeleteResponse> {
        non_empty("username", username)?;
        info!(username, "deleting user");
        let response =
            self.client
                .request_json(Method::Delete, &format!("/{username}"), &[], Body::Empty)?;
        DeleteResponse::from_value(response)
    }

    /// Patch the given fields and return the refreshed user.
    pub fn modify(&self, username: &str, update: &UserUpdate) -> Result<UserInfo> {
        non_empty("username", username)?;
        if update.is_empty() {
            return Err(DevpiError::validation(
                "No attributes provided to modify",
            ));
        }
        if update.password.as_deref() == Some("") {
            return Err(DevpiError::validation("Password cannot be empty"));
        }
        if matches!(update.email.as_deref(), Some(email) if email.trim().is_empty()) {
            return Err(DevpiError::validation("Email cannot be empty when provided"));
        }

        let fields: Vec<&str> = [
            update.password.as_ref().map(|_| "password"),
            update.email.as_ref().map(|_| "email"),
        ]
        .into_iter()
        .flatten()
        .collect();
        info!(username, ?fields, "modifying user");

        self.client.send(
            Method::Patch,
            &format!("/{username}"),
            &[],
            json_body(update)?,
        )?;
        self.get(username)
    }

    /// All users on the server, keyed and ordered by name.
    pub fn list(&self) -> Result<BTreeMap<String, UserInfo>> {
        debug!("listing users");
        let response = self.client.get_json("/", &[])?;
        Ok(UserList::from_value(response)?.into_inner())
    }

    /// `false` when the server answers 404; other errors propagate.
    pub fn exists(&self, username: &str) -> Result<bool> {
        match self.get(username) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn change_password(&self, username: &str, new_password: &str) -> Result<UserInfo> {
        non_empty("username", username)?;
        non_empty("new_password", new_password)?;
        info!(username, "changing password");
        self.modify(username, &UserUpdate::password(new_password))
    }

    pub fn change_email(&self, username: &str, new_email: &str) -> Result<UserInfo> {
        non_empty("username", username)?;
        non_empty("new_email", new_email)?;
        info!(username, "changing email");
        self.modify(username, &UserUpdate::email(new_email.trim()))
    }
}

fn unexpected_user_format(username: &str, response: Value) -> DevpiError {
    DevpiError::parsing(
        format!("Unexpected response format when retrieving user {username}"),
        Some(response),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use crate::transport::Response;

    fn user_doc(name: &str) -> Value {
        json!({
            "type": "userconfig",
            "result": {
                "username": name,
                "email": format!("{name}@example.com"),
                "indexes": {"dev": {"type": "stage", "bases": [], "volatile": true}}
            }
        })
    }

    #[test]
    fn create_sends_trimmed_email() {
        let (client, log) = MockTransport::client(vec![Response::json(201, &user_doc("alice"))]);
        let user = client
            .user()
            .create("alice", "pw123", Some("  alice@example.com "))
            .unwrap();
        assert_eq!(user.username, "alice");

        let request = &log.requests()[0];
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, "/alice");
        assert_eq!(
            request.body,
            Body::Json(json!({"password": "pw123", "email": "alice@example.com"}))
        );
    }

    #[test]
    fn create_omits_blank_email() {
        let (client, log) = MockTransport::client(vec![Response::json(
            201,
            &json!({"result": {"email": ""}}),
        )]);
        let user = client.user().create("bob", "pw", Some("   ")).unwrap();
        assert_eq!(user.username, "bob");
        assert_eq!(log.requests()[0].body, Body::Json(json!({"password": "pw"})));
    }

    #[test]
    fn create_without_result() {
        let (client, _) = MockTransport::client(vec![Response::json(201, &json!({"message": "ok"}))]);
        let err = client.user().create("bob", "pw", None).unwrap_err();
        assert!(matches!(err, DevpiError::ResponseParsing { .. }));
        assert_eq!(err.message(), "User creation response missing result payload");
        assert_eq!(err.response_data(), Some(&json!({"message": "ok"})));
    }

    #[test]
    fn create_conflict() {
        let (client, _) = MockTransport::client(vec![Response::json(
            409,
            &json!({"message": "user alice exists"}),
        )]);
        let err = client.user().create("alice", "pw", None).unwrap_err();
        assert!(matches!(err, DevpiError::Conflict { .. }));
    }

    #[test]
    fn create_validates_arguments() {
        let (client, log) = MockTransport::client(vec![]);
        assert_eq!(
            client.user().create(" ", "pw", None).unwrap_err().message(),
            "Parameter 'username' must be a non-empty string"
        );
        assert_eq!(
            client.user().create("a", "", None).unwrap_err().message(),
            "Parameter 'password' must be a non-empty string"
        );
        assert!(log.requests().is_empty());
    }

    #[test]
    fn get_user() {
        let (client, log) = MockTransport::client(vec![Response::json(200, &user_doc("alice"))]);
        let user = client.user().get("alice").unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert!(user.has_index("dev"));
        assert_eq!(log.requests()[0].method, Method::Get);
    }

    #[test]
    fn get_unexpected_format() {
        let (client, _) = MockTransport::client(vec![Response::json(200, &json!({"foo": 1}))]);
        let err = client.user().get("alice").unwrap_err();
        assert_eq!(
            err.message(),
            "Unexpected response format when retrieving user alice"
        );
    }

    #[test]
    fn delete_user() {
        let (client, log) = MockTransport::client(vec![Response::json(
            200,
            &json!({"message": "user deleted"}),
        )]);
        let resp = client.user().delete("alice").unwrap();
        assert!(resp.is_success());
        assert_eq!(log.requests()[0].method, Method::Delete);
    }

    #[test]
    fn modify_patches_then_refetches() {
        let (client, log) = MockTransport::client(vec![
            Response::json(200, &json!({})),
            Response::json(200, &user_doc("alice")),
        ]);
        let update = UserUpdate {
            email: Some("new@example.com".into()),
            ..Default::default()
        };
        client.user().modify("alice", &update).unwrap();

        let requests = log.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::Patch);
        assert_eq!(requests[0].body, Body::Json(json!({"email": "new@example.com"})));
        assert_eq!(requests[1].method, Method::Get);
    }

    #[test]
    fn modify_validation() {
        let (client, log) = MockTransport::client(vec![]);
        let users = client.user();
        assert!(users
            .modify("alice", &UserUpdate::default())
            .unwrap_err()
            .message()
            .starts_with("No attributes provided to modify"));
        assert_eq!(
            users.modify("alice", &UserUpdate::password("")).unwrap_err().message(),
            "Password cannot be empty"
        );
        assert_eq!(
            users.modify("alice", &UserUpdate::email("  ")).unwrap_err().message(),
            "Email cannot be empty when provided"
        );
        assert!(log.requests().is_empty());
    }

    #[test]
    fn list_users() {
        let (client, _) = MockTransport::client(vec![Response::json(
            200,
            &json!({"result": {"root": {"username": "root"}, "alice": {"username": "alice"}}}),
        )]);
        let users = client.user().list().unwrap();
        assert_eq!(users.keys().collect::<Vec<_>>(), vec!["alice", "root"]);
    }

    #[test]
    fn exists_maps_not_found() {
        let (client, _) = MockTransport::client(vec![
            Response::json(200, &user_doc("alice")),
            Response::json(404, &json!({"message": "no user"})),
            Response::new(500, ""),
        ]);
        assert!(client.user().exists("alice").unwrap());
        assert!(!client.user().exists("ghost").unwrap());
        assert!(client.user().exists("boom").is_err());
    }

    #[test]
    fn change_password_and_email() {
        let (client, log) = MockTransport::client(vec![
            Response::json(200, &json!({})),
            Response::json(200, &user_doc("alice")),
            Response::json(200, &json!({})),
            Response::json(200, &user_doc("alice")),
        ]);
        client.user().change_password("alice", "n3w").unwrap();
        client.user().change_email("alice", " a@b.c ").unwrap();

        let requests = log.requests();
        assert_eq!(requests[0].body, Body::Json(json!({"password": "n3w"})));
        assert_eq!(requests[2].body, Body::Json(json!({"email": "a@b.c"})));

        assert_eq!(
            client.user().change_password("alice", "").unwrap_err().message(),
            "Parameter 'new_password' must be a non-empty string"
        );
        assert_eq!(
            client.user().change_email("alice", " ").unwrap_err().message(),
            "Parameter 'new_email' must be a non-empty string"
        );
    }
}
