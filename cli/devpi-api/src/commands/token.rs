//! `devpi-api token ...`

use anyhow::Result;
use chrono::Utc;
use devpi_client::{inspect_token, Client, TokenInfo, TokenRequest};
use serde_json::json;

use super::{joined, print_json};

fn restriction(values: &Option<Vec<String>>) -> String {
    match values {
        Some(values) => joined(values),
        None => "any".to_string(),
    }
}

fn print_token(token: &TokenInfo) {
    println!("Token: {}", token.id);
    println!("  User:     {}", token.user);
    println!("  Allowed:  {}", restriction(&token.allowed));
    println!("  Indexes:  {}", restriction(&token.indexes));
    println!("  Projects: {}", restriction(&token.projects));
    match token.expires_at() {
        Some(at) => {
            let note = if token.is_expired_at(Utc::now()) {
                " (expired)"
            } else {
                ""
            };
            println!("  Expires:  {}{note}", at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        None => println!("  Expires:  never"),
    }
}

/// Print the new token on its own line so it can be captured by scripts.
pub fn create(client: &Client, user: &str, request: &TokenRequest, json: bool) -> Result<()> {
    let token = client.token().create(user, request)?;
    if json {
        return print_json(&json!({"user": user, "token": token}));
    }
    eprintln!("Created token for {user}; it will not be shown again.");
    println!("{token}");
    Ok(())
}

pub fn list(client: &Client, user: &str, json: bool) -> Result<()> {
    let tokens = client.token().list(user)?;
    if json {
        return print_json(&tokens);
    }
    if tokens.is_empty() {
        println!("{user} has no tokens");
    }
    for token in tokens.values() {
        print_token(token);
    }
    Ok(())
}

pub fn delete(client: &Client, user: &str, token_id: &str, json: bool) -> Result<()> {
    let response = client.token().delete(user, token_id)?;
    if json {
        return print_json(&response);
    }
    println!("Deleted token {token_id} of {user}");
    Ok(())
}

/// Decode a token without contacting the server.
pub fn inspect(token: &str, json: bool) -> Result<()> {
    let info = inspect_token(token)?;
    if json {
        return print_json(&info);
    }
    print_token(&info);
    if !info.restrictions.is_empty() {
        println!("  Restrictions:");
        for item in &info.restrictions {
            println!("    {item}");
        }
    }
    Ok(())
}
