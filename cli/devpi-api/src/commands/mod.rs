//! CLI command implementations.

pub mod index;
pub mod project;
pub mod release;
pub mod server;
pub mod token;
pub mod user;

use anyhow::{bail, Result};
use serde::Serialize;

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Split a `USER/NAME` index argument.
pub fn split_index(spec: &str) -> Result<(&str, &str)> {
    match spec.split_once('/') {
        Some((user, name)) if !user.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((user, name))
        }
        _ => bail!("index must be given as USER/NAME, got '{spec}'"),
    }
}

/// Render a list for one-line display.
pub fn joined(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
