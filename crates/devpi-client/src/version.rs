//! Crate version and the User-Agent string derived from it.

/// Version of this client, taken from the package manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Product token sent with every request.
pub const PRODUCT: &str = "devpi-api-client";

/// `User-Agent` header value, e.g. `devpi-api-client/0.1.0`.
pub fn user_agent() -> String {
    format!("{PRODUCT}/{VERSION}")
}
