//! Client settings from `devpi-api.toml`, `.env` files and the environment.
//!
//! Each source yields a partial [`ClientConfig`]; [`ClientConfig::overlay`]
//! stacks them so that later sources win.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{Client, ClientOptions};
use crate::error::{DevpiError, Result};
use crate::transport::TlsVerify;

pub const ENV_URL: &str = "DEVPI_URL";
pub const ENV_USER: &str = "DEVPI_USER";
pub const ENV_PASSWORD: &str = "DEVPI_PASSWORD";
pub const ENV_TOKEN: &str = "DEVPI_TOKEN";
pub const ENV_CA_BUNDLE: &str = "DEVPI_CA_BUNDLE";
pub const ENV_VERIFY_SSL: &str = "DEVPI_VERIFY_SSL";
pub const ENV_TIMEOUT: &str = "DEVPI_TIMEOUT";

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "devpi-api.toml";

/// Connection settings; every field is optional until [`ClientConfig::build`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub ca_bundle: Option<PathBuf>,
    pub verify: Option<bool>,
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("token", &redact(&self.token))
            .field("ca_bundle", &self.ca_bundle)
            .field("verify", &self.verify)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ClientConfig,
}

impl ClientConfig {
    /// Parse the `[server]` table of a config file.
    pub fn parse(input: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(input)?;
        Ok(file.server)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DevpiError::Config {
            detail: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::parse(&content)
    }

    /// Read the `DEVPI_*` variables of the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `DEVPI_*` keys from a dotenv file without touching the process
    /// environment.
    pub fn from_env_file(path: &Path) -> Result<Self> {
        let iter = dotenvy::from_path_iter(path).map_err(|e| DevpiError::Config {
            detail: format!("cannot read {}: {e}", path.display()),
        })?;
        let mut vars = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| DevpiError::Config {
                detail: format!("invalid entry in {}: {e}", path.display()),
            })?;
            vars.insert(key, value);
        }
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let verify = get(ENV_VERIFY_SSL)
            .map(|raw| parse_bool(ENV_VERIFY_SSL, &raw))
            .transpose()?;
        let timeout_secs = get(ENV_TIMEOUT)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| DevpiError::Config {
                    detail: format!("{ENV_TIMEOUT} must be a whole number of seconds, got '{raw}'"),
                })
            })
            .transpose()?;

        Ok(ClientConfig {
            url: get(ENV_URL),
            user: get(ENV_USER),
            password: get(ENV_PASSWORD),
            token: get(ENV_TOKEN),
            ca_bundle: get(ENV_CA_BUNDLE).map(PathBuf::from),
            verify,
            timeout_secs,
        })
    }

    /// Fields set in `higher` replace those in `self`.
    ///
    /// Credentials switch as a unit: a token in `higher` drops the lower
    /// user and password, and a complete user/password pair in `higher`
    /// drops the lower token.
    pub fn overlay(self, higher: ClientConfig) -> ClientConfig {
        let (mut user, mut password, mut token) = (self.user, self.password, self.token);
        if higher.token.is_some() {
            user = None;
            password = None;
        }
        if higher.user.is_some() && higher.password.is_some() {
            token = None;
        }
        ClientConfig {
            url: higher.url.or(self.url),
            user: higher.user.or(user),
            password: higher.password.or(password),
            token: higher.token.or(token),
            ca_bundle: higher.ca_bundle.or(self.ca_bundle),
            verify: higher.verify.or(self.verify),
            timeout_secs: higher.timeout_secs.or(self.timeout_secs),
        }
    }

    /// TLS policy: disabled wins over a CA bundle.
    pub fn tls_verify(&self) -> TlsVerify {
        match (self.verify, &self.ca_bundle) {
            (Some(false), _) => TlsVerify::Disabled,
            (_, Some(path)) => TlsVerify::CaBundle(path.clone()),
            _ => TlsVerify::Enabled,
        }
    }

    pub fn to_options(&self) -> Result<ClientOptions> {
        let url = self.url.clone().ok_or_else(|| DevpiError::Config {
            detail: format!("no server URL configured; set {ENV_URL} or pass --url"),
        })?;
        let mut options = ClientOptions::new(url);
        options.user = self.user.clone();
        options.password = self.password.clone();
        options.token = self.token.clone();
        options.verify = self.tls_verify();
        if let Some(secs) = self.timeout_secs {
            options.timeout = Some(Duration::from_secs(secs));
        }
        Ok(options)
    }

    pub fn build(&self) -> Result<Client> {
        Client::new(self.to_options()?)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(DevpiError::Config {
            detail: format!("{key} must be true or false, got '{raw}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_server_table() {
        let config = ClientConfig::parse(
            r#"
            [server]
            url = "https://devpi.example.com"
            user = "ci"
            verify = false
            timeout_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.url.as_deref(), Some("https://devpi.example.com"));
        assert_eq!(config.verify, Some(false));
        assert_eq!(config.timeout_secs, Some(10));
        assert!(config.token.is_none());
    }

    #[test]
    fn parse_rejects_unknown_keys() {
        let err = ClientConfig::parse("[server]\nurll = \"x\"\n").unwrap_err();
        assert!(matches!(err, DevpiError::Toml(_)));
        assert_eq!(ClientConfig::parse("").unwrap(), ClientConfig::default());
    }

    #[test]
    fn env_lookup() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("DEVPI_URL", "http://localhost:3141"),
            ("DEVPI_TOKEN", "devpi-abc"),
            ("DEVPI_VERIFY_SSL", "No"),
            ("DEVPI_TIMEOUT", "5"),
            ("DEVPI_USER", "  "),
        ]))
        .unwrap();
        assert_eq!(config.url.as_deref(), Some("http://localhost:3141"));
        assert_eq!(config.verify, Some(false));
        assert_eq!(config.timeout_secs, Some(5));
        assert!(config.user.is_none());
    }

    #[test]
    fn env_lookup_rejects_bad_values() {
        let err = ClientConfig::from_lookup(lookup(&[("DEVPI_VERIFY_SSL", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("DEVPI_VERIFY_SSL"));
        let err = ClientConfig::from_lookup(lookup(&[("DEVPI_TIMEOUT", "soon")])).unwrap_err();
        assert!(err.to_string().contains("DEVPI_TIMEOUT"));
    }

    #[test]
    fn env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# local server\nDEVPI_URL=http://localhost:3141\nDEVPI_PASSWORD=\"s3cr3t\"\nOTHER=1\n",
        )
        .unwrap();
        let config = ClientConfig::from_env_file(&path).unwrap();
        assert_eq!(config.url.as_deref(), Some("http://localhost:3141"));
        assert_eq!(config.password.as_deref(), Some("s3cr3t"));

        let err = ClientConfig::from_env_file(&dir.path().join("missing.env")).unwrap_err();
        assert!(matches!(err, DevpiError::Config { .. }));
    }

    #[test]
    fn overlay_prefers_higher() {
        let file = ClientConfig {
            url: Some("http://file".into()),
            user: Some("file-user".into()),
            timeout_secs: Some(60),
            ..Default::default()
        };
        let env = ClientConfig {
            url: Some("http://env".into()),
            ..Default::default()
        };
        let merged = file.overlay(env);
        assert_eq!(merged.url.as_deref(), Some("http://env"));
        assert_eq!(merged.user.as_deref(), Some("file-user"));
        assert_eq!(merged.timeout_secs, Some(60));
    }

    #[test]
    fn overlay_switches_credentials_as_a_unit() {
        let lower = ClientConfig {
            token: Some("devpi-lower".into()),
            ..Default::default()
        };
        let login = ClientConfig {
            user: Some("root".into()),
            password: Some("pw".into()),
            ..Default::default()
        };
        let merged = lower.overlay(login);
        assert_eq!(merged.token, None);
        assert_eq!(merged.user.as_deref(), Some("root"));

        let lower = ClientConfig {
            user: Some("root".into()),
            password: Some("pw".into()),
            ..Default::default()
        };
        let token = ClientConfig {
            token: Some("devpi-higher".into()),
            ..Default::default()
        };
        let merged = lower.overlay(token);
        assert_eq!(merged.token.as_deref(), Some("devpi-higher"));
        assert_eq!(merged.user, None);
        assert_eq!(merged.password, None);

        // A lone username does not displace a lower token.
        let lower = ClientConfig {
            token: Some("devpi-lower".into()),
            ..Default::default()
        };
        let user_only = ClientConfig {
            user: Some("alice".into()),
            ..Default::default()
        };
        assert_eq!(lower.overlay(user_only).token.as_deref(), Some("devpi-lower"));
    }

    #[test]
    fn tls_policy() {
        let mut config = ClientConfig::default();
        assert_eq!(config.tls_verify(), TlsVerify::Enabled);
        config.ca_bundle = Some("/etc/ssl/ca.pem".into());
        assert_eq!(config.tls_verify(), TlsVerify::CaBundle("/etc/ssl/ca.pem".into()));
        config.verify = Some(false);
        assert_eq!(config.tls_verify(), TlsVerify::Disabled);
    }

    #[test]
    fn options_need_url() {
        let err = ClientConfig::default().to_options().unwrap_err();
        assert!(err.to_string().contains("DEVPI_URL"));

        let config = ClientConfig {
            url: Some("http://localhost:3141".into()),
            timeout_secs: Some(7),
            ..Default::default()
        };
        let options = config.to_options().unwrap();
        assert_eq!(options.timeout, Some(Duration::from_secs(7)));
        assert!(config.build().is_ok());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = ClientConfig {
            password: Some("hunter2".into()),
            token: Some("devpi-xyz".into()),
            ..Default::default()
        };
        let shown = format!("{config:?}");
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("devpi-xyz"));
    }
}
