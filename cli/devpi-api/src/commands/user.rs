//! `devpi-api user ...`

use anyhow::{bail, Result};
use devpi_client::{Client, UserInfo, UserUpdate};
use serde_json::json;

use super::print_json;

fn print_user(user: &UserInfo) {
    println!("User: {}", user.username);
    if !user.email.is_empty() {
        println!("  Email:   {}", user.email);
    }
    if let Some(created) = user.created {
        println!("  Created: {}", created.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if user.indexes.is_empty() {
        println!("  Indexes: none");
    } else {
        println!("  Indexes:");
        for (name, config) in &user.indexes {
            let kind = if config.volatile {
                format!("{}, volatile", config.index_type)
            } else {
                config.index_type.clone()
            };
            println!("    {name} ({kind})");
        }
    }
}

pub fn list(client: &Client, json: bool) -> Result<()> {
    let users = client.user().list()?;
    if json {
        return print_json(&users);
    }
    for (name, user) in &users {
        if user.email.is_empty() {
            println!("{name}");
        } else {
            println!("{name}  <{}>", user.email);
        }
    }
    Ok(())
}

pub fn get(client: &Client, username: &str, json: bool) -> Result<()> {
    let user = client.user().get(username)?;
    if json {
        return print_json(&user);
    }
    print_user(&user);
    Ok(())
}

pub fn create(
    client: &Client,
    username: &str,
    password: &str,
    email: Option<&str>,
    json: bool,
) -> Result<()> {
    let user = client.user().create(username, password, email)?;
    if json {
        return print_json(&user);
    }
    println!("Created user {}", user.username);
    Ok(())
}

pub fn delete(client: &Client, username: &str, json: bool) -> Result<()> {
    let response = client.user().delete(username)?;
    if json {
        return print_json(&response);
    }
    println!("Deleted user {username}");
    Ok(())
}

pub fn modify(
    client: &Client,
    username: &str,
    password: Option<String>,
    email: Option<String>,
    json: bool,
) -> Result<()> {
    let update = UserUpdate { password, email };
    if update.is_empty() {
        bail!("nothing to change; pass --new-password and/or --email");
    }
    let user = client.user().modify(username, &update)?;
    if json {
        return print_json(&user);
    }
    println!("Updated user {}", user.username);
    Ok(())
}

pub fn passwd(client: &Client, username: &str, new_password: &str, json: bool) -> Result<()> {
    let user = client.user().change_password(username, new_password)?;
    if json {
        return print_json(&json!({"username": user.username, "password_changed": true}));
    }
    println!("Password changed for {}", user.username);
    Ok(())
}

pub fn exists(client: &Client, username: &str, json: bool) -> Result<()> {
    let found = client.user().exists(username)?;
    if json {
        return print_json(&json!({"username": username, "exists": found}));
    }
    println!("{}", if found { "yes" } else { "no" });
    Ok(())
}
