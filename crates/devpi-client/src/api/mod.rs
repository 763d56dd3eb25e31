//! Resource sub-clients borrowed from a [`Client`](crate::Client).

mod auth;
mod index;
mod project;
mod token;
mod user;

pub use auth::Auth;
pub use index::IndexApi;
pub use project::ProjectApi;
pub use token::{
    inspect_token, validate_permissions, TokenApi, HIDDEN_PERMISSIONS, PUBLIC_PERMISSIONS,
};
pub use user::UserApi;

use serde::Serialize;

use crate::error::Result;
use crate::transport::Body;

pub(crate) fn json_body<T: Serialize>(payload: &T) -> Result<Body> {
    Ok(Body::Json(serde_json::to_value(payload)?))
}
