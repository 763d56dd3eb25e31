use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info};

use crate::client::Client;
use crate::distribution::Distribution;
use crate::error::{DevpiError, Result};
use crate::models::project::versions_from_value;
use crate::models::{DeleteResponse, ProjectVersion, UploadReceipt};
use crate::transport::{Body, FilePart, Method};
use crate::validate::non_empty;

/// Package operations, `client.project()` or `client.package()`.
pub struct ProjectApi<'a> {
    client: &'a Client,
}

impl<'a> ProjectApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        ProjectApi { client }
    }

    /// Names of the projects in an index.
    pub fn list(&self, user: &str, index: &str) -> Result<Vec<String>> {
        non_empty("user", user)?;
        non_empty("index", index)?;
        debug!(user, index, "listing projects");
        let config = self.client.index().get(user, index, true)?;
        Ok(config.projects.unwrap_or_default())
    }

    /// Every version of `package` with its metadata and files.
    pub fn get(
        &self,
        user: &str,
        index: &str,
        package: &str,
    ) -> Result<BTreeMap<String, ProjectVersion>> {
        let path = project_path(user, index, package)?;
        debug!(project = %path, "retrieving project");
        let response = self.client.get_json(&path, &[])?;
        versions_from_value(response)
    }

    /// Upload a wheel, sdist or egg, registering it from its own metadata.
    pub fn upload(&self, user: &str, index: &str, file: &Path) -> Result<UploadReceipt> {
        non_empty("user", user)?;
        non_empty("index", index)?;
        if file.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(DevpiError::validation("filepath cannot be empty"));
        }

        let dist = Distribution::open(file)?;
        let (name, version) = dist.name_and_version()?;
        let (name, version) = (name.to_string(), version.to_string());

        let mut fields = vec![
            (":action".to_string(), "file_upload".to_string()),
            ("protocol_version".to_string(), "1".to_string()),
            ("name".to_string(), name.clone()),
            ("version".to_string(), version.clone()),
        ];
        if let Some(summary) = dist.metadata.summary.clone() {
            fields.push(("summary".to_string(), summary));
        }
        fields.push(("sha256_digest".to_string(), dist.sha256.clone()));

        info!(%name, %version, user, index, file = %dist.file_name, "uploading package");
        let receipt = UploadReceipt {
            name,
            version,
            file_name: dist.file_name.clone(),
            sha256_digest: dist.sha256.clone(),
            index: format!("{user}/{index}"),
        };
        let body = Body::Multipart {
            fields,
            file: FilePart {
                field: "content".to_string(),
                file_name: dist.file_name,
                bytes: dist.bytes,
            },
        };
        self.client
            .send(Method::Post, &format!("/{user}/{index}"), &[], body)?;

        info!(name = %receipt.name, version = %receipt.version, "upload succeeded");
        Ok(receipt)
    }

    /// Remove one version and all of its files.
    pub fn delete(
        &self,
        user: &str,
        index: &str,
        package: &str,
        version: &str,
    ) -> Result<DeleteResponse> {
        let path = project_path(user, index, package)?;
        non_empty("version", version)?;
        info!(project = %path, version, "deleting release");
        let response = self.client.request_json(
            Method::Delete,
            &format!("{path}/{version}"),
            &[],
            Body::Empty,
        )?;
        DeleteResponse::from_value(response)
    }

    /// Whether the project (or, given `version`, that release) exists.
    pub fn exists(
        &self,
        user: &str,
        index: &str,
        package: &str,
        version: Option<&str>,
    ) -> Result<bool> {
        match self.get(user, index, package) {
            Ok(versions) => Ok(match version.filter(|v| !v.is_empty()) {
                Some(version) => versions.contains_key(version),
                None => !versions.is_empty(),
            }),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn project_path(user: &str, index: &str, package: &str) -> Result<String> {
    non_empty("user", user)?;
    non_empty("index", index)?;
    non_empty("package_name", package)?;
    Ok(format!("/{user}/{index}/{package}"))
}
