use tracing::debug;

use crate::client::Client;
use crate::error::Result;
use crate::transport::Credentials;
use crate::validate::non_empty;

/// Switches the credentials of a client. Nothing is sent to the server;
/// devpi checks credentials on each request.
pub struct Auth<'a> {
    client: &'a mut Client,
}

impl<'a> Auth<'a> {
    pub(crate) fn new(client: &'a mut Client) -> Self {
        Auth { client }
    }

    /// Use HTTP basic auth with a username and password.
    pub fn user(&mut self, username: &str, password: &str) -> Result<()> {
        let username = non_empty("username", username)?.trim();
        let password = non_empty("password", password)?;
        self.client.set_credentials(Some(Credentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        }));
        debug!(username, "switched to password authentication");
        Ok(())
    }

    /// Use an API token.
    pub fn token(&mut self, token: &str) -> Result<()> {
        let token = non_empty("token", token)?.trim();
        self.client
            .set_credentials(Some(Credentials::Token(token.to_string())));
        debug!("switched to token authentication");
        Ok(())
    }

    pub fn logout(&mut self) {
        self.client.set_credentials(None);
        debug!("cleared credentials");
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.is_authenticated()
    }
}
