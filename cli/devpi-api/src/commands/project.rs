//! `devpi-api project ...`

use std::path::PathBuf;

use anyhow::{Context, Result};
use devpi_client::Client;
use serde_json::json;

use super::{print_json, split_index};

pub fn list(client: &Client, index: &str, json: bool) -> Result<()> {
    let (user, name) = split_index(index)?;
    let projects = client.project().list(user, name)?;
    if json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("{index} has no projects");
    }
    for project in &projects {
        println!("{project}");
    }
    Ok(())
}

pub fn get(client: &Client, index: &str, package: &str, json: bool) -> Result<()> {
    let (user, name) = split_index(index)?;
    let versions = client.project().get(user, name, package)?;
    if json {
        return print_json(&versions);
    }
    println!("Project: {package} ({index})");
    for (version, meta) in &versions {
        if meta.summary.is_empty() {
            println!("  {version}");
        } else {
            println!("  {version}  {}", meta.summary);
        }
        for link in meta.release_files() {
            println!("    {}", link.file_name());
        }
    }
    Ok(())
}

/// Upload each file in turn, stopping at the first failure.
pub fn upload(client: &Client, index: &str, files: &[PathBuf], json: bool) -> Result<()> {
    let (user, name) = split_index(index)?;
    let mut receipts = Vec::with_capacity(files.len());
    for file in files {
        let receipt = client
            .project()
            .upload(user, name, file)
            .with_context(|| format!("uploading {}", file.display()))?;
        if !json {
            println!(
                "Uploaded {} ({} {}) to {}",
                receipt.file_name, receipt.name, receipt.version, receipt.index
            );
        }
        receipts.push(receipt);
    }
    if json {
        return print_json(&receipts);
    }
    Ok(())
}

pub fn delete(client: &Client, index: &str, package: &str, version: &str, json: bool) -> Result<()> {
    let (user, name) = split_index(index)?;
    let response = client.project().delete(user, name, package, version)?;
    if json {
        return print_json(&response);
    }
    println!("Deleted {package} {version} from {index}");
    Ok(())
}

pub fn exists(
    client: &Client,
    index: &str,
    package: &str,
    version: Option<&str>,
    json: bool,
) -> Result<()> {
    let (user, name) = split_index(index)?;
    let found = client.project().exists(user, name, package, version)?;
    if json {
        return print_json(&json!({
            "index": index,
            "package": package,
            "version": version,
            "exists": found,
        }));
    }
    println!("{}", if found { "yes" } else { "no" });
    Ok(())
}
