//! `devpi-api server info`: connection diagnostics.

use anyhow::Result;
use devpi_client::TlsVerify;
use serde_json::{json, Value};

use crate::config;
use crate::GlobalArgs;

fn auth_mode(config: &devpi_client::ClientConfig) -> &'static str {
    if config.token.is_some() {
        "token"
    } else if config.user.is_some() && config.password.is_some() {
        "user/password"
    } else {
        "anonymous"
    }
}

fn tls_mode(verify: &TlsVerify) -> String {
    match verify {
        TlsVerify::Enabled => "system roots".to_string(),
        TlsVerify::CaBundle(path) => format!("CA bundle {}", path.display()),
        TlsVerify::Disabled => "verification disabled".to_string(),
    }
}

fn user_count(info: &Value) -> Option<usize> {
    info.get("result")
        .unwrap_or(info)
        .as_object()
        .map(|users| users.len())
}

/// Print client version, resolved settings and whether the server answers.
pub fn info(global: &GlobalArgs) -> Result<()> {
    let settings = config::resolve(global)?;
    let client = settings.build()?;
    let reply = client.server_info();

    if global.json {
        let (reachable, error, users) = match &reply {
            Ok(info) => (true, None, user_count(info)),
            Err(e) => (false, Some(e.message()), None),
        };
        return super::print_json(&json!({
            "client_version": devpi_client::version::VERSION,
            "url": client.base_url(),
            "auth": auth_mode(&settings),
            "user": settings.user,
            "tls": tls_mode(&settings.tls_verify()),
            "reachable": reachable,
            "users": users,
            "error": error,
        }));
    }

    println!("=== devpi-api ===");
    println!();
    println!("Client version: {}", devpi_client::version::VERSION);
    println!();

    println!("--- Connection ---");
    println!("  URL:   {}", client.base_url());
    match &settings.user {
        Some(user) => println!("  Auth:  {} ({user})", auth_mode(&settings)),
        None => println!("  Auth:  {}", auth_mode(&settings)),
    }
    println!("  TLS:   {}", tls_mode(&settings.tls_verify()));
    if let Some(secs) = settings.timeout_secs {
        println!("  Timeout: {secs}s");
    }
    println!();

    println!("--- Server ---");
    match reply {
        Ok(info) => {
            println!("  Status: reachable");
            if let Some(n) = user_count(&info) {
                println!("  Users:  {n}");
            }
        }
        Err(e) => {
            println!("  Status: unreachable ({})", e.message());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_mode_prefers_token() {
        let mut config = devpi_client::ClientConfig {
            user: Some("alice".into()),
            password: Some("pw".into()),
            ..Default::default()
        };
        assert_eq!(auth_mode(&config), "user/password");
        config.token = Some("devpi-x".into());
        assert_eq!(auth_mode(&config), "token");
        assert_eq!(auth_mode(&Default::default()), "anonymous");
    }

    #[test]
    fn counts_users_in_envelope_or_bare() {
        assert_eq!(user_count(&json!({"result": {"root": {}, "alice": {}}})), Some(2));
        assert_eq!(user_count(&json!({"root": {}})), Some(1));
        assert_eq!(user_count(&json!("nope")), None);
    }
}
