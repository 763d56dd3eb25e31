//! Typed views of devpi JSON responses.
//!
//! devpi wraps most payloads as `{"type": "...", "result": {...}}`; the
//! constructors here accept both the wrapped and the bare form.

pub mod common;
pub mod index;
pub mod project;
pub mod token;
pub mod user;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub use common::{DeleteResponse, UploadReceipt};
pub use index::{IndexConfig, IndexSpec, IndexUpdate};
pub use project::{Link, LogItem, ProjectVersion};
pub use token::{TokenInfo, TokenRequest};
pub use user::{UserInfo, UserList, UserUpdate};

/// Return the `result` member of a devpi envelope, or the value itself.
pub(crate) fn unwrap_result(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("result") => {
            map.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Deserialize `null` as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_envelope() {
        let wrapped = json!({"type": "indexconfig", "result": {"type": "stage"}});
        assert_eq!(unwrap_result(wrapped), json!({"type": "stage"}));
    }

    #[test]
    fn leaves_bare_values_alone() {
        let bare = json!({"type": "stage"});
        assert_eq!(unwrap_result(bare.clone()), bare);
        assert_eq!(unwrap_result(Value::Null), Value::Null);
    }
}
