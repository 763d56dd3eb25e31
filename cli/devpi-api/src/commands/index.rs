//! `devpi-api index ...`

use anyhow::Result;
use devpi_client::{Client, IndexConfig, IndexSpec, IndexUpdate};

use super::{joined, print_json, split_index};

fn print_index(config: &IndexConfig) {
    let name = config.full_name().unwrap_or_else(|| "?".to_string());
    println!("Index: {name}");
    println!("  Type:      {}", config.index_type);
    println!("  Volatile:  {}", config.volatile);
    println!("  Bases:     {}", joined(&config.bases));
    println!("  Upload ACL: {}", joined(&config.acl_upload));
    if let Some(url) = &config.mirror_url {
        println!("  Mirror of: {url}");
    }
    if let Some(title) = &config.title {
        println!("  Title:     {title}");
    }
    if let Some(projects) = &config.projects {
        println!("  Projects ({}):", projects.len());
        for project in projects {
            println!("    {project}");
        }
    }
}

pub fn list(client: &Client, user: &str, json: bool) -> Result<()> {
    let indexes = client.index().list(user)?;
    if json {
        return print_json(&indexes);
    }
    if indexes.is_empty() {
        println!("{user} has no indexes");
    }
    for (name, config) in &indexes {
        println!("{user}/{name}  {}", config.index_type);
    }
    Ok(())
}

pub fn get(client: &Client, index: &str, projects: bool, json: bool) -> Result<()> {
    let (user, name) = split_index(index)?;
    let config = client.index().get(user, name, projects)?;
    if json {
        return print_json(&config);
    }
    print_index(&config);
    Ok(())
}

pub fn create(client: &Client, index: &str, spec: &IndexSpec, json: bool) -> Result<()> {
    let (user, name) = split_index(index)?;
    let config = client.index().create(user, name, spec)?;
    if json {
        return print_json(&config);
    }
    println!("Created index {user}/{name}");
    print_index(&config);
    Ok(())
}

pub fn modify(client: &Client, index: &str, update: &IndexUpdate, json: bool) -> Result<()> {
    let (user, name) = split_index(index)?;
    let config = client.index().modify(user, name, update)?;
    if json {
        return print_json(&config);
    }
    println!("Updated index {user}/{name}");
    print_index(&config);
    Ok(())
}

pub fn delete(client: &Client, index: &str, json: bool) -> Result<()> {
    let (user, name) = split_index(index)?;
    let response = client.index().delete(user, name)?;
    if json {
        return print_json(&response);
    }
    println!("Deleted index {user}/{name}");
    Ok(())
}
