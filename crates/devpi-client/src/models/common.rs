//! Response types shared across resources.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DevpiError, Result};

/// Confirmation returned after deleting a user, index, token or release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub message: String,
}

impl DeleteResponse {
    /// Decode a delete confirmation. An empty body is accepted as a bare success.
    pub fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(DeleteResponse::default());
        }
        serde_json::from_value(value.clone()).map_err(|e| {
            DevpiError::parsing(format!("invalid delete response: {e}"), Some(value))
        })
    }

    /// Whether the server's message reads as a success.
    pub fn is_success(&self) -> bool {
        let msg = self.message.to_lowercase();
        msg.contains("success") || msg.contains("deleted")
    }
}

/// What was sent by a successful package upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub name: String,
    pub version: String,
    pub file_name: String,
    pub sha256_digest: String,
    /// `user/index` the file was uploaded to.
    pub index: String,
}
