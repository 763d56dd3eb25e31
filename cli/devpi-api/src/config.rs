//! Resolve connection settings for a CLI invocation.
//!
//! Layers, lowest first: config file, dotenv file, process environment,
//! command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use devpi_client::config::CONFIG_FILE;
use devpi_client::{Client, ClientConfig};
use tracing::debug;

use crate::GlobalArgs;

/// Search `start_dir` and its parents for `devpi-api.toml`.
pub fn find_and_load(start_dir: &Path) -> Result<Option<(ClientConfig, PathBuf)>> {
    let mut dir = start_dir.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            let config = ClientConfig::load(&candidate)
                .with_context(|| format!("parsing {}", candidate.display()))?;
            return Ok(Some((config, candidate)));
        }
        if !dir.pop() {
            break;
        }
    }
    Ok(None)
}

/// Settings given directly as flags.
fn from_flags(global: &GlobalArgs) -> ClientConfig {
    ClientConfig {
        url: global.url.clone(),
        user: global.user.clone(),
        password: global.password.clone(),
        token: global.token.clone(),
        ca_bundle: global.ca_bundle.clone(),
        verify: global.insecure.then_some(false),
        timeout_secs: global.timeout,
    }
}

/// Merge every source with `env` standing in for the process environment.
pub fn resolve_with(
    global: &GlobalArgs,
    cwd: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig> {
    let file = match &global.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => match find_and_load(cwd)? {
            Some((config, path)) => {
                debug!(path = %path.display(), "using config file");
                config
            }
            None => ClientConfig::default(),
        },
    };

    let dotenv = match &global.env_file {
        Some(path) => ClientConfig::from_env_file(path)?,
        None => {
            let default = cwd.join(".env");
            if default.is_file() {
                debug!(path = %default.display(), "using dotenv file");
                ClientConfig::from_env_file(&default)?
            } else {
                ClientConfig::default()
            }
        }
    };

    let resolved = file
        .overlay(dotenv)
        .overlay(ClientConfig::from_lookup(env)?)
        .overlay(from_flags(global));
    debug!(config = ?resolved, "resolved client settings");
    Ok(resolved)
}

pub fn resolve(global: &GlobalArgs) -> Result<ClientConfig> {
    let cwd = std::env::current_dir().context("reading working directory")?;
    resolve_with(global, &cwd, |key| std::env::var(key).ok())
}

/// Resolve settings and build a client.
pub fn connect(global: &GlobalArgs) -> Result<Client> {
    Ok(resolve(global)?.build()?)
}
